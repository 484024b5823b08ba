//! # peerwire
//!
//! Packet framing and peer message routing core for blockchain nodes.
//!
//! This crate turns raw bytes on a stream into typed, integrity-checked
//! packets and multiplexes them to the right protocol handler — and fans
//! outbound traffic to the right subset of peers: one (unicast), a
//! role-scoped group (multicast), or a TTL-bounded flood (broadcast).
//! Connection establishment, peer discovery and overlay topology live
//! outside, behind the [`Transport`] trait.
//!
//! ## Layers
//! - [`core`] — the [`Packet`] wire unit, the incremental [`PacketCodec`]
//!   (usable directly with `tokio_util::codec::Framed`), blocking
//!   reader/writer wrappers, and the in-process [`PacketBuffer`]
//! - [`routing`] — [`Membership`]: reactor registration, inbound dispatch
//!   by sub-protocol, cast primitives, role/authority tables
//! - [`transport`] — the collaborator interface consumed from the node
//! - [`config`], [`error`], [`utils`] — configuration, error taxonomy,
//!   logging and metrics
//!
//! ## Example
//! ```rust
//! use bytes::Bytes;
//! use peerwire::{Packet, PacketBuffer, ProtocolId};
//!
//! # fn main() -> peerwire::Result<()> {
//! let buffer = PacketBuffer::new();
//!
//! let mut pkt = Packet::new(
//!     ProtocolId::new(0x0100),
//!     ProtocolId::new(0x0001),
//!     Bytes::from_static(b"hello"),
//! );
//! buffer.write_packet(&mut pkt)?;
//!
//! let received = buffer.read_packet()?;
//! assert_eq!(received.payload().as_ref(), b"hello");
//! assert_eq!(received.checksum(), pkt.checksum());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod routing;
pub mod transport;
pub mod utils;

pub use crate::core::buffer::PacketBuffer;
pub use crate::core::codec::{DecodedPacket, PacketCodec, PacketReader, PacketWriter};
pub use crate::core::packet::{Packet, PeerId, ProtocolId, DEST_ANY, DEST_PEER, DEST_PEER_GROUP};
pub use crate::error::{ProtocolError, Result};
pub use crate::routing::membership::{Membership, MembershipInfo, Reactor};
pub use crate::routing::roles::{
    Authority, BroadcastType, Role, AUTHORITY_BROADCAST, AUTHORITY_MULTICAST, ROLE_SEED,
    ROLE_VALIDATOR,
};
pub use crate::transport::{MemoryTransport, Route, Transport};
