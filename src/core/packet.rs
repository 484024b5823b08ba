//! Packet type and wire-level helpers.
//!
//! A [`Packet`] carries an opaque payload between peers together with the
//! routing header described in [`crate::core`]. The integrity checksum is
//! FNV-1a 64 over the header and payload bytes exactly as they appear on
//! the wire; a checksum of zero marks a packet that has not been sealed
//! yet, and [`Packet::seal`] is idempotent so re-sends skip recomputation.

use std::fmt;
use std::hash::Hasher;

use bytes::{BufMut, Bytes};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};

use crate::config::{PACKET_HEADER_SIZE, PEER_ID_SIZE};

/// Destination class: broadcast-eligible.
pub const DEST_ANY: u8 = 0x00;
/// Destination class: a role-scoped peer group.
pub const DEST_PEER_GROUP: u8 = 0x08;
/// Destination class: exactly one peer.
pub const DEST_PEER: u8 = 0xFF;

/// Fixed-length binary peer identifier.
///
/// String-form identifiers are resolved to this binary form by the peer
/// identity resolver, outside this crate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// The all-zero identifier, used for not-yet-attributed packets.
    pub const ZERO: PeerId = PeerId([0u8; PEER_ID_SIZE]);

    /// Build an identifier from a byte slice; `None` unless exactly
    /// [`PEER_ID_SIZE`] bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; PEER_ID_SIZE] = bytes.try_into().ok()?;
        Some(PeerId(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[u8; PEER_ID_SIZE]> for PeerId {
    fn from(bytes: [u8; PEER_ID_SIZE]) -> Self {
        PeerId(bytes)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}

/// Two-byte protocol or sub-protocol code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(u16);

impl ProtocolId {
    pub const fn new(code: u16) -> Self {
        ProtocolId(code)
    }

    pub const fn code(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// The wire-format data unit: header, opaque payload, integrity footer.
///
/// `sender`, `dest_peer` and `priority` never hit the wire; they are owned
/// by whichever component currently holds the packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Top-level protocol family code.
    pub protocol: ProtocolId,
    /// Logical message type within the family; the dispatch key.
    pub sub_protocol: ProtocolId,
    /// Originating peer; [`PeerId::ZERO`] when not yet attributed.
    pub src: PeerId,
    /// Destination class byte ([`DEST_ANY`], [`DEST_PEER_GROUP`], [`DEST_PEER`]).
    pub dest: u8,
    /// Hop budget; 0 means unlimited propagation.
    pub ttl: u8,
    payload: Bytes,
    checksum: u64,

    /// Peer that handed us this packet, for loop suppression.
    pub sender: Option<PeerId>,
    /// Resolved unicast target.
    pub dest_peer: Option<PeerId>,
    /// Send-queue priority class.
    pub priority: u8,
}

impl Packet {
    /// Create an unsealed packet addressed to [`DEST_ANY`] with zero TTL.
    pub fn new(protocol: ProtocolId, sub_protocol: ProtocolId, payload: Bytes) -> Self {
        Self {
            protocol,
            sub_protocol,
            src: PeerId::ZERO,
            dest: DEST_ANY,
            ttl: 0,
            payload,
            checksum: 0,
            sender: None,
            dest_peer: None,
            priority: 0,
        }
    }

    pub(crate) fn from_wire(
        protocol: ProtocolId,
        sub_protocol: ProtocolId,
        src: PeerId,
        dest: u8,
        ttl: u8,
        payload: Bytes,
        checksum: u64,
    ) -> Self {
        Self {
            protocol,
            sub_protocol,
            src,
            dest,
            ttl,
            payload,
            checksum,
            sender: None,
            dest_peer: None,
            priority: 0,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Transmitted integrity hash; 0 until sealed or decoded.
    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    pub fn is_sealed(&self) -> bool {
        self.checksum != 0
    }

    pub(crate) fn set_checksum(&mut self, checksum: u64) {
        self.checksum = checksum;
    }

    /// Header bytes in wire order.
    pub fn header_bytes(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut hb = [0u8; PACKET_HEADER_SIZE];
        let mut buf = &mut hb[..];
        buf.put_u16(self.protocol.code());
        buf.put_u16(self.sub_protocol.code());
        buf.put_slice(self.src.as_bytes());
        buf.put_u8(self.dest);
        buf.put_u8(self.ttl);
        buf.put_u32(self.payload.len() as u32);
        hb
    }

    /// Recompute the integrity hash over header and payload.
    pub fn compute_checksum(&self) -> u64 {
        wire_checksum(&self.header_bytes(), &self.payload)
    }

    /// Populate the checksum if not already set and return it.
    ///
    /// Idempotent: a sealed packet keeps its stored value, so re-sending
    /// the same packet object skips recomputation.
    pub fn seal(&mut self) -> u64 {
        if self.checksum == 0 {
            self.checksum = self.compute_checksum();
        }
        self.checksum
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{pi:{},spi:{},src:{},dest:{:#04x},ttl:{},len:{},hash:{:#x}}}",
            self.protocol,
            self.sub_protocol,
            self.src,
            self.dest,
            self.ttl,
            self.payload.len(),
            self.checksum,
        )
    }
}

/// FNV-1a 64 over header bytes then payload bytes, in wire order.
pub(crate) fn wire_checksum(header: &[u8], payload: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(header);
    hasher.write(payload);
    hasher.finish()
}
