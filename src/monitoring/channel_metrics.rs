//! # Channel Metrics
//!
//! Lock-free counters describing how a bounded queue is used: throughput,
//! backpressure (producers finding the queue full), starvation (consumers
//! finding it empty), timeouts and saturation.
//!
//! Saturation thresholds: 0.8 = degraded, 0.95 = critical.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Saturation ratio at which a queue is reported as degraded
pub const DEGRADED_SATURATION: f64 = 0.8;
/// Saturation ratio at which a queue is reported as critical
pub const CRITICAL_SATURATION: f64 = 0.95;

/// Health derived from current saturation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl ChannelHealthStatus {
    pub fn from_saturation(saturation: f64) -> Self {
        if saturation >= CRITICAL_SATURATION {
            ChannelHealthStatus::Critical
        } else if saturation >= DEGRADED_SATURATION {
            ChannelHealthStatus::Degraded
        } else {
            ChannelHealthStatus::Healthy
        }
    }
}

/// Point-in-time snapshot of a queue's counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub queue_id: Uuid,
    pub queue_name: String,
    pub capacity: usize,
    pub depth: usize,
    /// Depth divided by capacity (0.0 - 1.0)
    pub saturation: f64,
    pub health: ChannelHealthStatus,
    /// Messages successfully enqueued
    pub messages_sent: u64,
    /// Messages successfully dequeued
    pub messages_received: u64,
    /// Termination sentinels enqueued
    pub terminations_sent: u64,
    /// Times a producer found the queue full and had to wait
    pub backpressure_events: u64,
    /// Times a consumer found the queue empty and had to wait
    pub empty_waits: u64,
    /// Retry sleeps taken by polling backends
    pub retries: u64,
    /// Operations abandoned because a deadline expired
    pub timeouts: u64,
    pub collected_at: DateTime<Utc>,
}

/// Shared counters for a single queue
#[derive(Debug)]
pub struct ChannelMonitor {
    queue_id: Uuid,
    queue_name: String,
    capacity: usize,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    terminations_sent: AtomicU64,
    backpressure_events: AtomicU64,
    empty_waits: AtomicU64,
    retries: AtomicU64,
    timeouts: AtomicU64,
}

impl ChannelMonitor {
    pub fn new(queue_name: impl Into<String>, capacity: usize) -> Self {
        Self {
            queue_id: Uuid::new_v4(),
            queue_name: queue_name.into(),
            capacity,
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            terminations_sent: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
            empty_waits: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    pub fn queue_id(&self) -> Uuid {
        self.queue_id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn record_send(&self, is_termination: bool) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        if is_termination {
            self.terminations_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_receive(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_wait(&self) {
        self.empty_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters together with the caller-observed depth
    pub fn snapshot(&self, depth: usize) -> ChannelMetrics {
        let saturation = if self.capacity == 0 {
            0.0
        } else {
            (depth as f64 / self.capacity as f64).min(1.0)
        };

        ChannelMetrics {
            queue_id: self.queue_id,
            queue_name: self.queue_name.clone(),
            capacity: self.capacity,
            depth,
            saturation,
            health: ChannelHealthStatus::from_saturation(saturation),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            terminations_sent: self.terminations_sent.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            empty_waits: self.empty_waits.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            collected_at: Utc::now(),
        }
    }
}
