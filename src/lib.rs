#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Work Queue Core
//!
//! Bounded producer/consumer work queues with backpressure and a
//! sentinel-based termination protocol.
//!
//! ## Overview
//!
//! A producer appends batches of records, each tagged with an iteration number,
//! to a fixed-capacity FIFO. One or more consumers remove them. When the queue
//! is full the producer waits; when it is empty consumers wait. The producer
//! ends the stream by enqueueing a termination message that carries no records.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Queue messages, the [`WorkQueue`] trait and its backends
//! - [`pipeline`] - Producer/consumer roles and the async source-to-destination runner
//! - [`config`] - Layered configuration loading and validation
//! - [`monitoring`] - Per-queue counters and saturation health
//! - [`resilience`] - Jittered retry delays for the polling backend
//! - [`logging`] - Console tracing setup and structured log helpers
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust
//! use std::thread;
//! use workqueue_core::{BoundedWorkQueue, Consumer, Producer, WorkQueue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let queue = BoundedWorkQueue::with_name("orders", 2)?;
//!
//! let worker = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         Consumer::new(queue)
//!             .map(|message| message.map(|m| m.records.len()))
//!             .sum::<Result<usize, _>>()
//!     })
//! };
//!
//! let mut producer = Producer::new(queue);
//! producer.send(vec!["a", "b"])?;
//! producer.send(vec!["c"])?;
//! assert!(producer.finish(1));
//!
//! assert_eq!(worker.join().unwrap()?, 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod monitoring;
pub mod pipeline;
pub mod resilience;

pub use config::{
    BackoffConfig, ConfigManager, ConfigurationError, PipelineConfig, QueueConfig, WorkQueueConfig,
};
pub use error::{Result, WorkQueueError};
pub use messaging::{
    BoundedWorkQueue, MessagingError, MessagingResult, PollingWorkQueue, QueueMessage,
    QueueRegistry, QueueSignal, WorkQueue,
};
pub use monitoring::{ChannelHealthStatus, ChannelMetrics, ChannelMonitor};
pub use pipeline::{
    Consumer, Destination, DestinationReport, PipelineReport, PipelineRunner, Producer, Source,
};
pub use resilience::JitteredBackoff;
