//! # Monitoring and Observability
//!
//! Queue health and contention counters.
//!
//! ## Modules
//!
//! - `channel_metrics`: per-queue counters, saturation and health status

pub mod channel_metrics;

pub use channel_metrics::{ChannelHealthStatus, ChannelMetrics, ChannelMonitor};
