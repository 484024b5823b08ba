//! # Transport Interface
//!
//! The narrow surface this crate consumes from the node's transport layer:
//! ordered byte streams and per-priority send queues are owned out there,
//! along with the overlay topology (which peers are upside, downside, or
//! friends). Routing hands fully-built packets across this boundary and
//! never inspects topology itself.
//!
//! [`MemoryTransport`] is an in-process implementation for tests and for
//! wiring two memberships together without sockets.

pub mod memory;

pub use memory::{MemoryTransport, Route};

use crate::core::packet::{Packet, PeerId};
use crate::error::Result;
use crate::routing::roles::Role;

/// Outbound packet sink backed by the node's transport layer.
///
/// TTL decrement on forwarded broadcasts happens behind this trait, at
/// each forwarding hop, not in the packet producer.
pub trait Transport: Send + Sync {
    /// Deliver to exactly one peer. An unreachable peer is
    /// [`crate::ProtocolError::NoRoute`].
    fn send_to_peer(&self, pkt: Packet, peer: &PeerId) -> Result<()>;

    /// Forward toward the upside of the overlay, to peers satisfying
    /// `role`.
    fn send_upside(&self, pkt: Packet, role: &Role) -> Result<()>;

    /// Forward toward downside peers (children of this node in the tree).
    fn send_downside(&self, pkt: Packet) -> Result<()>;

    /// Forward to lateral peers at the same tree depth.
    fn send_to_friends(&self, pkt: Packet) -> Result<()>;

    /// Queue a packet for further local delivery (upstream relay), as
    /// requested by a reactor.
    fn relay(&self, pkt: Packet) -> Result<()>;

    /// Outbound queue depth per priority class for one peer, for
    /// administrative snapshots. `None` when the peer is unknown.
    fn queue_depths(&self, peer: &PeerId) -> Option<Vec<usize>> {
        let _ = peer;
        None
    }
}
