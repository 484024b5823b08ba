//! In-process transport for tests and socketless wiring.

use std::sync::Mutex;

use crate::config::SEND_QUEUE_MAX_PRIORITY;
use crate::core::packet::{Packet, PeerId};
use crate::error::{ProtocolError, Result};
use crate::routing::roles::Role;
use crate::transport::Transport;

/// Where a recorded packet was headed.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Peer(PeerId),
    Upside(Role),
    Downside,
    Friends,
    Relay,
}

/// Recording transport: every send is captured instead of hitting a
/// socket, and unicast routing honors an explicit peer table.
#[derive(Default)]
pub struct MemoryTransport {
    peers: Mutex<Vec<PeerId>>,
    sent: Mutex<Vec<(Route, Packet)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `peer` reachable for unicast.
    pub fn add_route(&self, peer: PeerId) -> Result<()> {
        let mut peers = self
            .peers
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned("memory transport peers"))?;
        if !peers.contains(&peer) {
            peers.push(peer);
        }
        Ok(())
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<(Route, Packet)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Drain the send record.
    pub fn take_sent(&self) -> Vec<(Route, Packet)> {
        self.sent
            .lock()
            .map(|mut s| std::mem::take(&mut *s))
            .unwrap_or_default()
    }

    fn record(&self, route: Route, pkt: Packet) -> Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned("memory transport record"))?;
        sent.push((route, pkt));
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn send_to_peer(&self, pkt: Packet, peer: &PeerId) -> Result<()> {
        let known = self
            .peers
            .lock()
            .map_err(|_| ProtocolError::LockPoisoned("memory transport peers"))?
            .contains(peer);
        if !known {
            return Err(ProtocolError::NoRoute(*peer));
        }
        self.record(Route::Peer(*peer), pkt)
    }

    fn send_upside(&self, pkt: Packet, role: &Role) -> Result<()> {
        self.record(Route::Upside(role.clone()), pkt)
    }

    fn send_downside(&self, pkt: Packet) -> Result<()> {
        self.record(Route::Downside, pkt)
    }

    fn send_to_friends(&self, pkt: Packet) -> Result<()> {
        self.record(Route::Friends, pkt)
    }

    fn relay(&self, pkt: Packet) -> Result<()> {
        self.record(Route::Relay, pkt)
    }

    fn queue_depths(&self, peer: &PeerId) -> Option<Vec<usize>> {
        let peers = self.peers.lock().ok()?;
        if !peers.contains(peer) {
            return None;
        }
        drop(peers);

        let mut depths = vec![0usize; SEND_QUEUE_MAX_PRIORITY as usize + 1];
        let sent = self.sent.lock().ok()?;
        for (route, pkt) in sent.iter() {
            if *route == Route::Peer(*peer) {
                depths[pkt.priority as usize] += 1;
            }
        }
        Some(depths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::ProtocolId;
    use bytes::Bytes;

    fn sample_packet(priority: u8) -> Packet {
        let mut pkt = Packet::new(
            ProtocolId::new(1),
            ProtocolId::new(2),
            Bytes::from_static(b"x"),
        );
        pkt.priority = priority;
        pkt
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_unicast_requires_route() {
        let transport = MemoryTransport::new();
        let peer = PeerId::from([9; 20]);
        assert!(matches!(
            transport.send_to_peer(sample_packet(0), &peer),
            Err(ProtocolError::NoRoute(_))
        ));

        transport.add_route(peer).unwrap();
        transport.send_to_peer(sample_packet(0), &peer).unwrap();
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_queue_depths_by_priority() {
        let transport = MemoryTransport::new();
        let peer = PeerId::from([7; 20]);
        transport.add_route(peer).unwrap();
        transport.send_to_peer(sample_packet(0), &peer).unwrap();
        transport.send_to_peer(sample_packet(3), &peer).unwrap();
        transport.send_to_peer(sample_packet(3), &peer).unwrap();

        let depths = transport.queue_depths(&peer).unwrap();
        assert_eq!(depths[0], 1);
        assert_eq!(depths[3], 2);
        assert!(transport.queue_depths(&PeerId::ZERO).is_none());
    }
}
