//! # Messaging Module
//!
//! Bounded work queues moving batches of records from a producer to one or
//! more consumers, with backpressure and a termination sentinel.

pub mod bounded_queue;
pub mod errors;
pub mod message;
pub mod polling_queue;
pub mod queue;
pub mod registry;

pub use bounded_queue::BoundedWorkQueue;
pub use errors::{MessagingError, MessagingResult};
pub use message::{QueueMessage, QueueSignal};
pub use polling_queue::PollingWorkQueue;
pub use queue::WorkQueue;
pub use registry::{validate_queue_name, QueueRegistry};
