//! # Routing Components
//!
//! Protocol multiplexing and peer routing: the membership that owns
//! reactor registration and dispatch, the role/authority vocabulary, and
//! the ordered sets backing both tables.
//!
//! ## Components
//! - **Membership**: sub-protocol dispatch plus unicast/multicast/broadcast
//! - **Roles**: role, authority and broadcast-type vocabulary
//! - **Sets**: duplicate-free, insertion-ordered membership tables

pub mod membership;
pub mod roles;
pub mod sets;
