//! Observability counters for the packet and routing layers.
//!
//! Atomic counters, updated from every connection's decode thread without
//! coordination; `snapshot()` gives admin tooling a consistent-enough view.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for protocol operations.
#[derive(Debug)]
pub struct Metrics {
    /// Packets fully framed from inbound bytes
    pub packets_decoded: AtomicU64,
    /// Packets serialized for sending
    pub packets_encoded: AtomicU64,
    /// Wire bytes consumed by the decoder
    pub bytes_in: AtomicU64,
    /// Wire bytes produced by the encoder
    pub bytes_out: AtomicU64,
    /// Footer hash mismatches
    pub integrity_failures: AtomicU64,
    /// Packets handed to a reactor
    pub packets_dispatched: AtomicU64,
    /// Packets re-queued for local delivery at a reactor's request
    pub packets_relayed: AtomicU64,
    /// Inbound packets with no registered reactor
    pub drops_unknown_sub_protocol: AtomicU64,
    /// Inbound privileged casts from peers without the required authority
    pub drops_unauthorized: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            packets_decoded: AtomicU64::new(0),
            packets_encoded: AtomicU64::new(0),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
            integrity_failures: AtomicU64::new(0),
            packets_dispatched: AtomicU64::new(0),
            packets_relayed: AtomicU64::new(0),
            drops_unknown_sub_protocol: AtomicU64::new(0),
            drops_unauthorized: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn packet_decoded(&self, byte_count: u64) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn packet_encoded(&self, byte_count: u64) {
        self.packets_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn integrity_failure(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_dispatched(&self) {
        self.packets_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_relayed(&self) {
        self.packets_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn drop_unknown_sub_protocol(&self) {
        self.drops_unknown_sub_protocol
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn drop_unauthorized(&self) {
        self.drops_unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            packets_encoded: self.packets_encoded.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            packets_dispatched: self.packets_dispatched.load(Ordering::Relaxed),
            packets_relayed: self.packets_relayed.load(Ordering::Relaxed),
            drops_unknown_sub_protocol: self.drops_unknown_sub_protocol.load(Ordering::Relaxed),
            drops_unauthorized: self.drops_unauthorized.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            packets_decoded = snapshot.packets_decoded,
            packets_encoded = snapshot.packets_encoded,
            bytes_in = snapshot.bytes_in,
            bytes_out = snapshot.bytes_out,
            integrity_failures = snapshot.integrity_failures,
            packets_dispatched = snapshot.packets_dispatched,
            packets_relayed = snapshot.packets_relayed,
            drops_unknown_sub_protocol = snapshot.drops_unknown_sub_protocol,
            drops_unauthorized = snapshot.drops_unauthorized,
            uptime_seconds = snapshot.uptime_seconds,
            "Packet layer metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub packets_decoded: u64,
    pub packets_encoded: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub integrity_failures: u64,
    pub packets_dispatched: u64,
    pub packets_relayed: u64,
    pub drops_unknown_sub_protocol: u64,
    pub drops_unauthorized: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
