//! Role, authority and cast-type vocabulary.
//!
//! Roles tag peers with capabilities (a validator, a seed); authorities
//! tag roles with permissions checked before honoring privileged casts.
//! Both are cheap string-like keys: the well-known constants borrow
//! statically and never allocate.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::packet::{DEST_ANY, DEST_PEER_GROUP};

/// Logical capability tag assigned to peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const fn from_static(name: &'static str) -> Self {
        Role(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Role(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Peers that take part in consensus.
pub const ROLE_VALIDATOR: Role = Role::from_static("validator");
/// Peers that bootstrap newcomers into the overlay.
pub const ROLE_SEED: Role = Role::from_static("seed");

/// Permission tag granted to roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(Cow<'static, str>);

impl Authority {
    pub const fn from_static(name: &'static str) -> Self {
        Authority(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Authority(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Required before a peer's TTL-bounded floods are honored.
pub const AUTHORITY_BROADCAST: Authority = Authority::from_static("broadcast");
/// Required before a peer's role-scoped group casts are honored.
pub const AUTHORITY_MULTICAST: Authority = Authority::from_static("multicast");

/// Hop budget classes for [`crate::Membership::broadcast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastType {
    /// Unlimited-hop flood.
    All,
    /// One hop: direct neighbors only.
    Neighbor,
}

impl BroadcastType {
    /// TTL stamped on the packet; forwarding hops decrement non-zero values.
    pub fn ttl(self) -> u8 {
        match self {
            BroadcastType::All => 0,
            BroadcastType::Neighbor => 1,
        }
    }
}

/// Authority a source peer must hold before a packet of the given
/// destination class is acted upon. Exact-peer delivery is unprivileged.
pub fn required_authority(dest: u8) -> Option<Authority> {
    match dest {
        DEST_ANY => Some(AUTHORITY_BROADCAST),
        DEST_PEER_GROUP => Some(AUTHORITY_MULTICAST),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::DEST_PEER;

    #[test]
    fn test_broadcast_type_ttl() {
        assert_eq!(BroadcastType::All.ttl(), 0);
        assert_eq!(BroadcastType::Neighbor.ttl(), 1);
    }

    #[test]
    fn test_required_authority_by_cast() {
        assert_eq!(required_authority(DEST_ANY), Some(AUTHORITY_BROADCAST));
        assert_eq!(
            required_authority(DEST_PEER_GROUP),
            Some(AUTHORITY_MULTICAST)
        );
        assert_eq!(required_authority(DEST_PEER), None);
    }

    #[test]
    fn test_static_and_owned_roles_compare_equal() {
        assert_eq!(Role::new("validator"), ROLE_VALIDATOR);
        assert_ne!(Role::new("fullnode"), ROLE_VALIDATOR);
    }
}
