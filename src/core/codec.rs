//! Incremental packet framing over byte streams.
//!
//! [`PacketCodec`] implements [`Decoder`] and [`Encoder`] so it plugs into
//! `tokio_util::codec::Framed` for async connections. Decode is a
//! resumable state machine (header, payload, footer): partial input
//! returns `None` and a later call picks up exactly where the previous one
//! stopped, without re-parsing consumed bytes. The rolling FNV-1a digest
//! is accumulated as bytes are consumed and returned beside the packet in
//! [`DecodedPacket`]; comparing it against the transmitted footer is the
//! caller's decision.
//!
//! [`PacketReader`] and [`PacketWriter`] wrap the same codec for blocking
//! per-connection decode threads. The writer retries only zero-progress
//! ("short") writes, a bounded number of times with a fixed delay.

use std::hash::Hasher;
use std::io::{ErrorKind, Read, Write};
use std::mem;
use std::thread;

use bytes::{Buf, BytesMut};
use fnv::FnvHasher;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::config::{CodecConfig, PACKET_FOOTER_SIZE, PACKET_HEADER_SIZE, PEER_ID_SIZE};
use crate::core::packet::{Packet, PeerId, ProtocolId};
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::global_metrics;

/// A fully-framed packet plus the digest recomputed while reading it.
///
/// The packet's own checksum is the transmitted footer value; `computed`
/// is what the bytes on the wire actually hash to.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub packet: Packet,
    pub computed: u64,
}

impl DecodedPacket {
    pub fn is_valid(&self) -> bool {
        self.packet.checksum() == self.computed
    }

    /// Enforce integrity, consuming the wrapper.
    pub fn verify(self) -> Result<Packet> {
        if self.is_valid() {
            Ok(self.packet)
        } else {
            global_metrics().integrity_failure();
            Err(ProtocolError::IntegrityMismatch {
                reported: self.packet.checksum(),
                computed: self.computed,
            })
        }
    }
}

struct WireHeader {
    protocol: ProtocolId,
    sub_protocol: ProtocolId,
    src: PeerId,
    dest: u8,
    ttl: u8,
    payload_len: usize,
}

enum DecodeState {
    Header,
    Payload { head: WireHeader, digest: FnvHasher },
    Footer { packet: Packet, computed: u64 },
}

/// Stateful packet codec for one byte stream.
///
/// One instance per connection direction; the in-progress frame lives in
/// the codec across calls.
pub struct PacketCodec {
    max_payload: usize,
    state: DecodeState,
}

impl PacketCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            max_payload: config.max_payload_size,
            state: DecodeState::Header,
        }
    }

    /// Discard any in-progress frame and return to awaiting a header.
    pub fn reset(&mut self) {
        self.state = DecodeState::Header;
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl Decoder for PacketCodec {
    type Item = DecodedPacket;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DecodedPacket>> {
        loop {
            match mem::replace(&mut self.state, DecodeState::Header) {
                DecodeState::Header => {
                    if src.len() < PACKET_HEADER_SIZE {
                        return Ok(None);
                    }
                    let mut digest = FnvHasher::default();
                    digest.write(&src[..PACKET_HEADER_SIZE]);

                    let mut hdr = src.split_to(PACKET_HEADER_SIZE);
                    let protocol = ProtocolId::new(hdr.get_u16());
                    let sub_protocol = ProtocolId::new(hdr.get_u16());
                    let mut id = [0u8; PEER_ID_SIZE];
                    hdr.copy_to_slice(&mut id);
                    let head = WireHeader {
                        protocol,
                        sub_protocol,
                        src: PeerId::from(id),
                        dest: hdr.get_u8(),
                        ttl: hdr.get_u8(),
                        payload_len: hdr.get_u32() as usize,
                    };
                    if head.payload_len > self.max_payload {
                        return Err(ProtocolError::OversizedPayload {
                            length: head.payload_len,
                            max: self.max_payload,
                        });
                    }
                    self.state = DecodeState::Payload { head, digest };
                }
                DecodeState::Payload { head, mut digest } => {
                    let needed = head.payload_len + PACKET_FOOTER_SIZE;
                    if src.len() < head.payload_len {
                        src.reserve(needed - src.len());
                        self.state = DecodeState::Payload { head, digest };
                        return Ok(None);
                    }
                    let payload = src.split_to(head.payload_len).freeze();
                    digest.write(&payload);
                    let computed = digest.finish();
                    let packet = Packet::from_wire(
                        head.protocol,
                        head.sub_protocol,
                        head.src,
                        head.dest,
                        head.ttl,
                        payload,
                        0,
                    );
                    self.state = DecodeState::Footer { packet, computed };
                }
                DecodeState::Footer {
                    mut packet,
                    computed,
                } => {
                    if src.len() < PACKET_FOOTER_SIZE {
                        self.state = DecodeState::Footer { packet, computed };
                        return Ok(None);
                    }
                    packet.set_checksum(src.get_u64());
                    let metrics = global_metrics();
                    metrics.packet_decoded(
                        (PACKET_HEADER_SIZE + packet.payload_len() + PACKET_FOOTER_SIZE) as u64,
                    );
                    return Ok(Some(DecodedPacket { packet, computed }));
                }
            }
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, mut pkt: Packet, dst: &mut BytesMut) -> Result<()> {
        if pkt.payload_len() > self.max_payload {
            return Err(ProtocolError::OversizedPayload {
                length: pkt.payload_len(),
                max: self.max_payload,
            });
        }
        let checksum = pkt.seal();
        let frame_len = PACKET_HEADER_SIZE + pkt.payload_len() + PACKET_FOOTER_SIZE;
        dst.reserve(frame_len);
        dst.extend_from_slice(&pkt.header_bytes());
        dst.extend_from_slice(pkt.payload());
        dst.extend_from_slice(&checksum.to_be_bytes());
        global_metrics().packet_encoded(frame_len as u64);
        Ok(())
    }
}

/// Blocking packet reader over a byte stream.
///
/// Backs a per-connection inbound decode loop: `read_packet` blocks until
/// a full frame is available. A transient failure of the underlying read
/// leaves the in-progress frame intact, so the caller can retry and
/// resume mid-packet.
pub struct PacketReader<R> {
    io: R,
    buf: BytesMut,
    chunk: Box<[u8]>,
    codec: PacketCodec,
}

impl<R: Read> PacketReader<R> {
    pub fn new(io: R) -> Self {
        Self::with_config(io, &CodecConfig::default())
    }

    pub fn with_config(io: R, config: &CodecConfig) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(config.buffer_size),
            chunk: vec![0u8; config.buffer_size].into_boxed_slice(),
            codec: PacketCodec::new(config),
        }
    }

    /// Block until one complete packet is framed.
    ///
    /// EOF mid-stream is [`ProtocolError::EndOfStream`]; a stream error is
    /// fatal for the read in progress but the already-consumed portion of
    /// the frame is kept for a resumed call.
    pub fn read_packet(&mut self) -> Result<DecodedPacket> {
        loop {
            if let Some(decoded) = self.codec.decode(&mut self.buf)? {
                return Ok(decoded);
            }
            let n = match self.io.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(ProtocolError::EndOfStream);
            }
            self.buf.extend_from_slice(&self.chunk[..n]);
        }
    }

    /// Discard buffered stream bytes (connection reuse). The in-progress
    /// frame inside the codec is deliberately kept; use
    /// [`PacketCodec::reset`] semantics via [`Self::discard_frame`] for that.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Drop the in-progress frame as well as buffered bytes.
    pub fn discard_frame(&mut self) {
        self.buf.clear();
        self.codec.reset();
    }

    pub fn get_ref(&self) -> &R {
        &self.io
    }
}

/// Blocking packet writer over a byte stream.
///
/// `write_packet` seals and buffers the frame; `flush` pushes it out,
/// retrying only zero-progress writes up to the configured budget with a
/// fixed delay between attempts. Any other error returns immediately.
pub struct PacketWriter<W> {
    io: W,
    buf: BytesMut,
    codec: PacketCodec,
    rewrite_limit: u32,
    rewrite_delay: std::time::Duration,
}

impl<W: Write> PacketWriter<W> {
    pub fn new(io: W) -> Self {
        Self::with_config(io, &CodecConfig::default())
    }

    pub fn with_config(io: W, config: &CodecConfig) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(config.buffer_size),
            codec: PacketCodec::new(config),
            rewrite_limit: config.rewrite_limit,
            rewrite_delay: config.rewrite_delay,
        }
    }

    /// Serialize `pkt` into the outbound buffer.
    ///
    /// Seals the caller's packet as a side effect: the first send
    /// populates its checksum, later re-sends of the same object skip the
    /// recomputation.
    pub fn write_packet(&mut self, pkt: &mut Packet) -> Result<()> {
        pkt.seal();
        self.codec.encode(pkt.clone(), &mut self.buf)
    }

    /// Push buffered frames to the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        let mut retries = 0u32;
        while !self.buf.is_empty() {
            match self.io.write(&self.buf) {
                Ok(0) => {
                    if retries >= self.rewrite_limit {
                        return Err(ProtocolError::ShortWrite { attempts: retries });
                    }
                    retries += 1;
                    warn!(retries, "short write, retrying");
                    thread::sleep(self.rewrite_delay);
                }
                Ok(n) => {
                    self.buf.advance(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.io.flush()?;
        Ok(())
    }

    /// Drop buffered, unflushed frames (connection reuse).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn get_ref(&self) -> &W {
        &self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodecConfig;
    use bytes::Bytes;
    use std::time::Duration;

    fn sample_packet(payload: &'static [u8]) -> Packet {
        Packet::new(
            ProtocolId::new(0x0001),
            ProtocolId::new(0x0002),
            Bytes::from_static(payload),
        )
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_decode_resumes_across_partial_feeds() {
        let mut codec = PacketCodec::default();
        let mut wire = BytesMut::new();
        codec.encode(sample_packet(b"resumable"), &mut wire).unwrap();

        let mut feed = BytesMut::new();
        for (i, byte) in wire.iter().enumerate() {
            feed.extend_from_slice(&[*byte]);
            let result = codec.decode(&mut feed).unwrap();
            if i < wire.len() - 1 {
                assert!(result.is_none());
            } else {
                let decoded = result.unwrap();
                assert!(decoded.is_valid());
                assert_eq!(decoded.packet.payload().as_ref(), b"resumable");
            }
        }
        assert!(feed.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_oversize_detected_before_payload_arrives() {
        let config = CodecConfig {
            max_payload_size: 16,
            ..CodecConfig::default()
        };
        let mut codec = PacketCodec::new(&config);

        let mut pkt = sample_packet(&[0u8; 32]);
        pkt.ttl = 1;
        // Header only: the length field alone must trigger the failure.
        let mut buf = BytesMut::from(&pkt.header_bytes()[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::OversizedPayload { length: 32, max: 16 }
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let config = CodecConfig {
            max_payload_size: 4,
            ..CodecConfig::default()
        };
        let mut codec = PacketCodec::new(&config);
        let mut buf = BytesMut::new();
        let result = codec.encode(sample_packet(b"too long"), &mut buf);
        assert!(matches!(
            result,
            Err(ProtocolError::OversizedPayload { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_reader_writer_roundtrip_over_stream() {
        let mut writer = PacketWriter::new(Vec::new());
        let mut pkt = sample_packet(b"hello stream");
        writer.write_packet(&mut pkt).unwrap();
        writer.flush().unwrap();
        assert!(pkt.is_sealed());

        let wire = writer.get_ref().clone();
        let mut reader = PacketReader::new(&wire[..]);
        let got = reader.read_packet().unwrap().verify().unwrap();
        assert_eq!(got.payload().as_ref(), b"hello stream");
        assert_eq!(got.checksum(), pkt.checksum());
    }

    #[test]
    fn test_reader_reports_end_of_stream() {
        let mut reader = PacketReader::new(&[][..]);
        assert!(matches!(
            reader.read_packet(),
            Err(ProtocolError::EndOfStream)
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_buffer_reset_is_distinct_from_frame_state() {
        let mut codec = PacketCodec::default();
        let mut wire = BytesMut::new();
        codec.encode(sample_packet(b"split"), &mut wire).unwrap();

        // Deliver the header plus a payload fragment, then discard the
        // buffered (unconsumed) bytes: the parsed header must survive, so
        // re-delivering the payload from its start still frames the packet.
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire[..PACKET_HEADER_SIZE + 2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);

        buf.clear();
        buf.extend_from_slice(&wire[PACKET_HEADER_SIZE..]);
        let got = codec.decode(&mut buf).unwrap().unwrap();
        assert!(got.is_valid());
        assert_eq!(got.packet.payload().as_ref(), b"split");
    }

    /// Writer that never makes progress.
    struct Stuck;

    impl Write for Stuck {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_flush_gives_up_after_retry_budget() {
        let config = CodecConfig {
            rewrite_limit: 2,
            rewrite_delay: Duration::from_millis(1),
            ..CodecConfig::default()
        };
        let mut writer = PacketWriter::with_config(Stuck, &config);
        writer.write_packet(&mut sample_packet(b"x")).unwrap();
        assert!(matches!(
            writer.flush(),
            Err(ProtocolError::ShortWrite { attempts: 2 })
        ));
    }

    /// Writer that fails once with a non-transient error.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::BrokenPipe, "gone"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_flush_propagates_other_errors_immediately() {
        let config = CodecConfig {
            rewrite_limit: 10,
            rewrite_delay: Duration::from_millis(1),
            ..CodecConfig::default()
        };
        let mut writer = PacketWriter::with_config(Broken, &config);
        writer.write_packet(&mut sample_packet(b"x")).unwrap();
        assert!(matches!(writer.flush(), Err(ProtocolError::Io(_))));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_sealed_packet_checksum_survives_reencode() {
        let mut codec = PacketCodec::default();
        let mut pkt = sample_packet(b"stable");
        let sealed = pkt.seal();

        let mut first = BytesMut::new();
        codec.encode(pkt.clone(), &mut first).unwrap();
        let mut second = BytesMut::new();
        codec.encode(pkt, &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            &first[first.len() - PACKET_FOOTER_SIZE..],
            &sealed.to_be_bytes()
        );
    }
}
