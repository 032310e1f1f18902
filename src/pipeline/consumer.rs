//! # Consumer
//!
//! Receiving side of a work queue. A consumer stops at the first termination
//! message it sees and never pulls from the queue again, so each sentinel
//! retires exactly one consumer.

use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

use crate::messaging::{BoundedWorkQueue, MessagingResult, QueueMessage, WorkQueue};

pub struct Consumer<T, Q> {
    queue: Q,
    timeout: Option<Duration>,
    terminated: bool,
    received: u64,
    _records: PhantomData<fn() -> T>,
}

impl<T, Q> Consumer<T, Q>
where
    Q: WorkQueue<T>,
{
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            timeout: None,
            terminated: false,
            received: 0,
            _records: PhantomData,
        }
    }

    /// Give up on an empty queue after `timeout` instead of waiting indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Whether the termination message has been received
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Data batches received so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Next data batch, or `None` once the termination message arrives
    pub fn recv(&mut self) -> MessagingResult<Option<QueueMessage<T>>> {
        if self.terminated {
            return Ok(None);
        }
        let message = self.queue.get_message(self.timeout)?;
        Ok(self.accept(message))
    }

    fn accept(&mut self, message: QueueMessage<T>) -> Option<QueueMessage<T>> {
        if message.is_termination() {
            self.terminated = true;
            debug!(
                queue = %self.queue.name(),
                iteration = message.iteration,
                received = self.received,
                "Consumer received termination signal"
            );
            return None;
        }
        self.received += 1;
        Some(message)
    }
}

impl<T: Send + 'static> Consumer<T, BoundedWorkQueue<T>> {
    /// Async [`Consumer::recv`]
    pub async fn recv_async(&mut self) -> MessagingResult<Option<QueueMessage<T>>> {
        if self.terminated {
            return Ok(None);
        }
        let message = self.queue.get_message_async(self.timeout).await?;
        Ok(self.accept(message))
    }
}

/// Yields batches until the termination message. The first error is yielded
/// once and ends the iteration.
impl<T, Q> Iterator for Consumer<T, Q>
where
    Q: WorkQueue<T>,
{
    type Item = MessagingResult<QueueMessage<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.recv() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => None,
            Err(e) => {
                self.terminated = true;
                Some(Err(e))
            }
        }
    }
}
