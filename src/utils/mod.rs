//! # Utility Modules
//!
//! Cross-cutting support for the packet and routing layers.
//!
//! ## Components
//! - **Logging**: tracing subscriber setup from injected configuration
//! - **Metrics**: thread-safe observability counters

pub mod logging;
pub mod metrics;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
