//! In-process duplex packet rendezvous.
//!
//! Two logical endpoints exchange exactly one framed packet at a time over
//! a shared growable buffer, without a real socket. This is a single-slot
//! rendezvous, not a queue: one packet in flight per direction, cached
//! until [`PacketBuffer::reset`].

use std::sync::RwLock;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::config::CodecConfig;
use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};

struct Inner {
    buf: BytesMut,
    read_codec: PacketCodec,
    write_codec: PacketCodec,
    read_slot: Option<Packet>,
    write_slot: Option<Packet>,
}

/// Thread-safe read/write pair over a shared memory buffer.
///
/// Readers proceed concurrently with each other (the decoded packet is
/// cached under the shared lock) but never with a writer; the first reader
/// after a write performs the decode and the integrity check.
pub struct PacketBuffer {
    inner: RwLock<Inner>,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::with_config(&CodecConfig::default())
    }

    pub fn with_config(config: &CodecConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                buf: BytesMut::with_capacity(config.buffer_size),
                read_codec: PacketCodec::new(config),
                write_codec: PacketCodec::new(config),
                read_slot: None,
                write_slot: None,
            }),
        }
    }

    /// Encode and flush one packet into the shared buffer, sealing the
    /// caller's packet and recording it as the last written.
    pub fn write_packet(&self, pkt: &mut Packet) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ProtocolError::LockPoisoned("packet buffer"))?;
        pkt.seal();
        let Inner {
            buf, write_codec, ..
        } = &mut *inner;
        write_codec.encode(pkt.clone(), buf)?;
        inner.write_slot = Some(pkt.clone());
        Ok(())
    }

    /// Append pre-framed bytes to the shared buffer, as a producer that
    /// already holds encoded wire bytes (e.g. a relayed frame) would.
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ProtocolError::LockPoisoned("packet buffer"))?;
        inner.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Decode the in-flight packet, validating its integrity footer.
    ///
    /// The first call after a write decodes and caches; subsequent calls
    /// return the cached packet until [`Self::reset`]. An empty buffer is
    /// [`ProtocolError::EndOfStream`]; a checksum mismatch is
    /// [`ProtocolError::IntegrityMismatch`] carrying both hash values.
    pub fn read_packet(&self) -> Result<Packet> {
        {
            let inner = self
                .inner
                .read()
                .map_err(|_| ProtocolError::LockPoisoned("packet buffer"))?;
            if let Some(pkt) = &inner.read_slot {
                return Ok(pkt.clone());
            }
        }

        let mut inner = self
            .inner
            .write()
            .map_err(|_| ProtocolError::LockPoisoned("packet buffer"))?;
        // Another reader may have decoded while we waited for the lock.
        if let Some(pkt) = &inner.read_slot {
            return Ok(pkt.clone());
        }
        let Inner {
            buf, read_codec, ..
        } = &mut *inner;
        let decoded = read_codec
            .decode(buf)?
            .ok_or(ProtocolError::EndOfStream)?;
        let pkt = decoded.verify()?;
        inner.read_slot = Some(pkt.clone());
        Ok(pkt)
    }

    /// Last packet recorded by [`Self::write_packet`].
    pub fn last_written(&self) -> Result<Option<Packet>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ProtocolError::LockPoisoned("packet buffer"))?;
        Ok(inner.write_slot.clone())
    }

    /// Clear both directions: truncates the buffer and drops cached and
    /// in-progress packet state on each side.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ProtocolError::LockPoisoned("packet buffer"))?;
        inner.buf.clear();
        inner.read_codec.reset();
        inner.write_codec.reset();
        inner.read_slot = None;
        inner.write_slot = None;
        Ok(())
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}
