//! # Error Types
//!
//! All failure modes of the packet and routing layers.
//!
//! The taxonomy follows the connection lifecycle: framing violations are
//! fatal to the connection that produced them, integrity mismatches are
//! reported to the caller who owns the drop-or-disconnect policy,
//! registration conflicts are rejected synchronously at setup time, and
//! routing misses (unknown sub-protocol, unreachable peer) stay non-fatal
//! because protocol versions legitimately diverge across peers.

use std::io;
use thiserror::Error;

use crate::core::packet::{PeerId, ProtocolId};

/// Primary error type for all packet and routing operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A decoded length field exceeds the configured maximum. Fatal to the
    /// connection: the stream can no longer be trusted to be in frame.
    #[error("payload length {length} exceeds maximum {max}")]
    OversizedPayload { length: usize, max: usize },

    /// Transmitted and recomputed footer hashes disagree. Reported, not
    /// acted upon; the connection handler decides whether to disconnect.
    #[error("integrity hash mismatch: reported {reported:#018x}, computed {computed:#018x}")]
    IntegrityMismatch { reported: u64, computed: u64 },

    /// The stream ended before a complete packet was framed.
    #[error("stream closed mid-packet")]
    EndOfStream,

    /// A zero-progress write persisted through the bounded retry budget.
    #[error("short write persisted after {attempts} retries")]
    ShortWrite { attempts: u32 },

    #[error("reactor name already registered: {0}")]
    DuplicateReactor(String),

    #[error("sub-protocol {0} already claimed by another reactor")]
    SubProtocolClaimed(ProtocolId),

    #[error("no route to peer {0}")]
    NoRoute(PeerId),

    #[error("not found")]
    NotFound,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
