//! Protocol multiplexer and router.
//!
//! A [`Membership`] is bound to one protocol family and one transport
//! multiplexer for the node's lifetime. It owns the sub-protocol dispatch
//! table (populated once, at startup, before traffic flows), the
//! role/authority tables, and the outbound cast primitives. Dispatch and
//! table mutation are serialized behind one lock; reactors run outside it
//! so a slow handler never blocks table reads on other connections'
//! threads.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SEND_QUEUE_MAX_PRIORITY;
use crate::core::packet::{Packet, PeerId, ProtocolId, DEST_ANY, DEST_PEER, DEST_PEER_GROUP};
use crate::error::{ProtocolError, Result};
use crate::routing::roles::{required_authority, Authority, BroadcastType, Role};
use crate::routing::sets::OrderedSet;
use crate::transport::Transport;
use crate::utils::metrics::global_metrics;

/// A registered handler consuming packets for one or more sub-protocols.
pub trait Reactor: Send + Sync {
    /// Handle one inbound payload.
    ///
    /// `Ok(true)` asks for the packet to additionally be queued for
    /// further local delivery (upstream relay); `Ok(false)` means fully
    /// consumed. Errors are logged by the dispatcher and never stop the
    /// packet pump.
    fn on_receive(&self, sub_protocol: ProtocolId, payload: &Bytes, from: &PeerId) -> Result<bool>;
}

#[derive(Default)]
struct State {
    roles: HashMap<Role, OrderedSet<PeerId>>,
    authorities: HashMap<Authority, OrderedSet<Role>>,
    reactors: HashMap<String, Arc<dyn Reactor>>,
    dispatch: HashMap<ProtocolId, Arc<dyn Reactor>>,
}

/// Protocol multiplexer and router for one protocol family.
pub struct Membership {
    name: String,
    protocol: ProtocolId,
    self_id: PeerId,
    priority: u8,
    transport: Arc<dyn Transport>,
    state: RwLock<State>,
}

impl Membership {
    /// Bind a membership to a protocol family and a transport.
    ///
    /// `priority` is the send-queue class stamped on every outbound
    /// packet, clamped to [`SEND_QUEUE_MAX_PRIORITY`].
    pub fn new(
        name: impl Into<String>,
        protocol: ProtocolId,
        self_id: PeerId,
        priority: u8,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol,
            self_id,
            priority: priority.min(SEND_QUEUE_MAX_PRIORITY),
            transport,
            state: RwLock::new(State::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> ProtocolId {
        self.protocol
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| ProtocolError::LockPoisoned("membership state"))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| ProtocolError::LockPoisoned("membership state"))
    }

    /// Claim `sub_protocols` for `reactor` under a unique `name`.
    ///
    /// Fails without claiming anything if the name is taken or any listed
    /// sub-protocol already belongs to another reactor.
    pub fn register_reactor(
        &self,
        name: &str,
        reactor: Arc<dyn Reactor>,
        sub_protocols: &[ProtocolId],
    ) -> Result<()> {
        let mut state = self.write_state()?;
        if state.reactors.contains_key(name) {
            return Err(ProtocolError::DuplicateReactor(name.to_string()));
        }
        for sp in sub_protocols {
            if state.dispatch.contains_key(sp) {
                return Err(ProtocolError::SubProtocolClaimed(*sp));
            }
        }
        for sp in sub_protocols {
            state.dispatch.insert(*sp, Arc::clone(&reactor));
        }
        state.reactors.insert(name.to_string(), reactor);
        Ok(())
    }

    /// Inbound entry point, invoked by the transport for every packet
    /// carrying this membership's protocol code.
    ///
    /// Unknown sub-protocols and unauthorized privileged casts are
    /// dropped, not errors; reactor failures are logged and swallowed.
    pub fn on_packet(&self, pkt: Packet, from: PeerId) -> Result<()> {
        let metrics = global_metrics();

        if let Some(authority) = required_authority(pkt.dest) {
            if !self.source_has_authority(&authority, &pkt.src)? {
                debug!(
                    src = %pkt.src,
                    dest = %format_args!("{:#04x}", pkt.dest),
                    %authority,
                    "dropping packet from peer without required authority"
                );
                metrics.drop_unauthorized();
                return Ok(());
            }
        }

        let reactor = {
            let state = self.read_state()?;
            state.dispatch.get(&pkt.sub_protocol).cloned()
        };
        let Some(reactor) = reactor else {
            debug!(sub_protocol = %pkt.sub_protocol, "no reactor registered, dropping packet");
            metrics.drop_unknown_sub_protocol();
            return Ok(());
        };

        match reactor.on_receive(pkt.sub_protocol, pkt.payload(), &from) {
            Ok(true) => {
                let mut relayed = pkt;
                relayed.sender = Some(from);
                if let Err(e) = self.transport.relay(relayed) {
                    warn!(error = %e, "failed to queue packet for local relay");
                } else {
                    metrics.packet_relayed();
                }
            }
            Ok(false) => {}
            Err(e) => {
                warn!(sub_protocol = %pkt.sub_protocol, error = %e, "reactor failed");
            }
        }
        metrics.packet_dispatched();
        Ok(())
    }

    /// Whether the packet source holds a role carrying `authority`.
    ///
    /// An authority nobody has been granted is unrestricted: gating only
    /// engages once an operator grants it to at least one role.
    fn source_has_authority(&self, authority: &Authority, src: &PeerId) -> Result<bool> {
        let state = self.read_state()?;
        let Some(roles) = state.authorities.get(authority) else {
            return Ok(true);
        };
        if roles.is_empty() {
            return Ok(true);
        }
        let granted = roles.iter().any(|role| {
            state
                .roles
                .get(role)
                .is_some_and(|peers| peers.contains(src))
        });
        Ok(granted)
    }

    fn build_packet(&self, sub_protocol: ProtocolId, payload: Bytes) -> Packet {
        let mut pkt = Packet::new(self.protocol, sub_protocol, payload);
        pkt.src = self.self_id;
        pkt.priority = self.priority;
        pkt
    }

    /// Send to exactly one peer. The transport reports an unreachable
    /// peer; this layer does not track routes.
    pub fn unicast(&self, sub_protocol: ProtocolId, payload: Bytes, peer: PeerId) -> Result<()> {
        let mut pkt = self.build_packet(sub_protocol, payload);
        pkt.dest = DEST_PEER;
        pkt.dest_peer = Some(peer);
        self.transport.send_to_peer(pkt, &peer)
    }

    /// Send toward the upside of the overlay, to peers satisfying `role`
    /// (votes and other validator-scoped traffic).
    pub fn multicast(&self, sub_protocol: ProtocolId, payload: Bytes, role: Role) -> Result<()> {
        let mut pkt = self.build_packet(sub_protocol, payload);
        pkt.dest = DEST_PEER_GROUP;
        self.transport.send_upside(pkt, &role)
    }

    /// Flood laterally and downward with the hop budget of
    /// `broadcast_type`. Decrementing the TTL at each forwarding hop is
    /// the transport's responsibility.
    pub fn broadcast(
        &self,
        sub_protocol: ProtocolId,
        payload: Bytes,
        broadcast_type: BroadcastType,
    ) -> Result<()> {
        let mut pkt = self.build_packet(sub_protocol, payload);
        pkt.dest = DEST_ANY;
        pkt.ttl = broadcast_type.ttl();
        self.transport.send_to_friends(pkt.clone())?;
        self.transport.send_downside(pkt)
    }

    /// Tag `peer` with `role`; `Ok(false)` when it already held it.
    pub fn add_role(&self, role: Role, peer: PeerId) -> Result<bool> {
        let mut state = self.write_state()?;
        Ok(state.roles.entry(role).or_default().insert(peer))
    }

    /// Untag `peer`; `Ok(false)` when it did not hold the role.
    pub fn remove_role(&self, role: &Role, peer: &PeerId) -> Result<bool> {
        let mut state = self.write_state()?;
        Ok(state
            .roles
            .get_mut(role)
            .is_some_and(|peers| peers.remove(peer)))
    }

    pub fn has_role(&self, role: &Role, peer: &PeerId) -> Result<bool> {
        let state = self.read_state()?;
        Ok(state
            .roles
            .get(role)
            .is_some_and(|peers| peers.contains(peer)))
    }

    /// Every role `peer` currently holds, as a detached snapshot.
    pub fn roles(&self, peer: &PeerId) -> Result<Vec<Role>> {
        let state = self.read_state()?;
        Ok(state
            .roles
            .iter()
            .filter(|(_, peers)| peers.contains(peer))
            .map(|(role, _)| role.clone())
            .collect())
    }

    /// Peers holding `role`, in the order they were added.
    pub fn role_peers(&self, role: &Role) -> Result<Vec<PeerId>> {
        let state = self.read_state()?;
        Ok(state
            .roles
            .get(role)
            .map(OrderedSet::snapshot)
            .unwrap_or_default())
    }

    /// Grant `authority` to `role`; `Ok(false)` when already granted.
    pub fn grant_authority(&self, authority: Authority, role: Role) -> Result<bool> {
        let mut state = self.write_state()?;
        Ok(state.authorities.entry(authority).or_default().insert(role))
    }

    /// Revoke; `Ok(false)` when the grant did not exist.
    pub fn deny_authority(&self, authority: &Authority, role: &Role) -> Result<bool> {
        let mut state = self.write_state()?;
        Ok(state
            .authorities
            .get_mut(authority)
            .is_some_and(|roles| roles.remove(role)))
    }

    pub fn has_authority(&self, authority: &Authority, role: &Role) -> Result<bool> {
        let state = self.read_state()?;
        Ok(state
            .authorities
            .get(authority)
            .is_some_and(|roles| roles.contains(role)))
    }

    /// Every authority `role` currently carries, as a detached snapshot.
    pub fn authorities(&self, role: &Role) -> Result<Vec<Authority>> {
        let state = self.read_state()?;
        Ok(state
            .authorities
            .iter()
            .filter(|(_, roles)| roles.contains(role))
            .map(|(authority, _)| authority.clone())
            .collect())
    }

    /// Read-only snapshot for administrative tooling.
    pub fn info(&self) -> Result<MembershipInfo> {
        let state = self.read_state()?;
        let mut sub_protocols: Vec<ProtocolId> = state.dispatch.keys().copied().collect();
        sub_protocols.sort();
        let mut reactors: Vec<String> = state.reactors.keys().cloned().collect();
        reactors.sort();
        Ok(MembershipInfo {
            name: self.name.clone(),
            protocol: self.protocol,
            priority: self.priority,
            sub_protocols,
            reactors,
        })
    }
}

/// Snapshot of a membership's registration state, for admin queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipInfo {
    pub name: String,
    pub protocol: ProtocolId,
    pub priority: u8,
    pub sub_protocols: Vec<ProtocolId>,
    pub reactors: Vec<String>,
}
