//! # Pipeline
//!
//! Producer and consumer roles over a [`WorkQueue`](crate::messaging::WorkQueue),
//! and an async runner wiring a source to destinations through a queue.

pub mod consumer;
pub mod producer;
pub mod runner;

pub use consumer::Consumer;
pub use producer::Producer;
pub use runner::{Destination, DestinationReport, PipelineReport, PipelineRunner, Source};
