//! # Work Queue Contract
//!
//! The operations every queue backend provides. A producer appends batches
//! with [`WorkQueue::put`], consumers remove them with [`WorkQueue::get`], and
//! [`WorkQueue::terminate`] enqueues the empty sentinel batch that tells a
//! consumer to stop.
//!
//! Ordering is FIFO per producer. With several producers, messages from
//! different producers interleave in no particular order.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::errors::MessagingResult;
use super::message::{QueueMessage, QueueSignal};
use crate::monitoring::ChannelMetrics;

/// Bounded FIFO of [`QueueMessage`] values shared between threads
pub trait WorkQueue<T>: Send + Sync {
    /// Queue name used in logs and metrics
    fn name(&self) -> &str;

    /// Maximum number of messages held at once
    fn capacity(&self) -> usize;

    /// Messages currently buffered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    fn is_closed(&self) -> bool;

    /// Enqueue a message, waiting while the queue is full.
    ///
    /// `None` waits indefinitely. A full queue that never drains keeps the
    /// caller waiting forever unless a timeout is given or the queue is closed.
    fn put_message(&self, message: QueueMessage<T>, timeout: Option<Duration>)
        -> MessagingResult<()>;

    /// Enqueue a message only if a slot is free right now
    fn try_put_message(&self, message: QueueMessage<T>) -> MessagingResult<()>;

    /// Dequeue the oldest message, waiting while the queue is empty
    fn get_message(&self, timeout: Option<Duration>) -> MessagingResult<QueueMessage<T>>;

    /// Dequeue the oldest message if one is buffered
    fn try_get(&self) -> MessagingResult<Option<QueueMessage<T>>>;

    /// Wake every waiting caller and refuse further puts.
    ///
    /// Buffered messages can still be drained with `get`. Idempotent.
    fn close(&self);

    fn metrics(&self) -> ChannelMetrics;

    /// Build a validated message and enqueue it, waiting while full
    fn put(&self, records: Vec<T>, iteration: u64, signal: Option<QueueSignal>) -> MessagingResult<()> {
        let message = QueueMessage::new(records, iteration, signal)?;
        self.put_message(message, None)
    }

    /// Same as [`WorkQueue::put`] but gives up after `timeout`
    fn put_timeout(
        &self,
        records: Vec<T>,
        iteration: u64,
        signal: Option<QueueSignal>,
        timeout: Duration,
    ) -> MessagingResult<()> {
        let message = QueueMessage::new(records, iteration, signal)?;
        self.put_message(message, Some(timeout))
    }

    /// Same as [`WorkQueue::put`] but fails immediately when full
    fn try_put(&self, records: Vec<T>, iteration: u64, signal: Option<QueueSignal>) -> MessagingResult<()> {
        let message = QueueMessage::new(records, iteration, signal)?;
        self.try_put_message(message)
    }

    /// Remove and return the oldest message, waiting while empty
    fn get(&self) -> MessagingResult<QueueMessage<T>> {
        self.get_message(None)
    }

    /// Same as [`WorkQueue::get`] but gives up after `timeout`
    fn get_timeout(&self, timeout: Duration) -> MessagingResult<QueueMessage<T>> {
        self.get_message(Some(timeout))
    }

    /// Enqueue the termination sentinel for `iteration`.
    ///
    /// Returns `false` if the queue was closed before the sentinel went in.
    fn terminate(&self, iteration: u64) -> bool {
        match self.put_message(QueueMessage::termination(iteration), None) {
            Ok(()) => {
                info!(queue = %self.name(), iteration, "Termination signal enqueued");
                true
            }
            Err(e) => {
                warn!(
                    queue = %self.name(),
                    iteration,
                    error = %e,
                    "Failed to enqueue termination signal"
                );
                false
            }
        }
    }
}

/// Absolute deadline for an optional timeout; `None` when unbounded
pub(crate) fn deadline_after(timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|t| Instant::now().checked_add(t))
}
