//! # Core Packet Components
//!
//! The wire-format data unit, the incremental codec, and the in-process
//! duplex packet buffer.
//!
//! ## Components
//! - **Packet**: Binary packet format with integrity footer
//! - **Codec**: Tokio codec for framing over byte streams, plus blocking
//!   reader/writer wrappers for per-connection decode threads
//! - **Buffer**: Mutex-guarded single-slot packet rendezvous
//!
//! ## Wire Format
//! ```text
//! [Protocol(2)] [SubProtocol(2)] [Src(20)] [Dest(1)] [TTL(1)] [Length(4)]
//! [Payload(N)]
//! [IntegrityHash(8)]
//! ```
//!
//! All integers are big-endian. The integrity hash is FNV-1a 64 over
//! header and payload bytes in wire order.
//!
//! ## Security
//! - Length validation before payload allocation (caps memory taken by a
//!   corrupt or malicious peer)
//! - Checksum mismatch is always reported, never silently accepted

pub mod buffer;
pub mod codec;
pub mod packet;
