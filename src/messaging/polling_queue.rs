//! # Polling Work Queue
//!
//! [`WorkQueue`] backed by a mutex-guarded ring buffer. A caller that finds
//! the queue full (put) or empty (get) sleeps for a randomized delay and tries
//! again, until it succeeds, its deadline passes or the queue is closed.
//!
//! Waiting callers keep a thread busy while they poll. Prefer
//! [`BoundedWorkQueue`](super::BoundedWorkQueue) unless callers need this
//! retry timing.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::errors::{MessagingError, MessagingResult};
use super::message::QueueMessage;
use super::queue::{deadline_after, WorkQueue};
use crate::config::{BackoffConfig, ConfigurationError, QueueConfig};
use crate::monitoring::{ChannelMetrics, ChannelMonitor};
use crate::resilience::JitteredBackoff;

struct PollingInner<T> {
    name: String,
    capacity: usize,
    buffer: Mutex<VecDeque<QueueMessage<T>>>,
    closed: AtomicBool,
    backoff: JitteredBackoff,
    monitor: ChannelMonitor,
}

/// Fixed-capacity FIFO with retry-with-jitter waiting.
///
/// Cloning yields another handle to the same queue.
pub struct PollingWorkQueue<T> {
    inner: Arc<PollingInner<T>>,
}

impl<T> Clone for PollingWorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for PollingWorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingWorkQueue")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("len", &self.inner.buffer.lock().len())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .field("backoff", &self.inner.backoff)
            .finish()
    }
}

impl<T> PollingWorkQueue<T> {
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        backoff: &BackoffConfig,
    ) -> Result<Self, ConfigurationError> {
        let name: String = name.into();
        if capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "capacity",
                "0",
                format!("queue '{name}' needs room for at least one message"),
            ));
        }
        if backoff.min_delay_ms > backoff.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "backoff.min_delay_ms",
                backoff.min_delay_ms.to_string(),
                format!("must not exceed backoff.max_delay_ms ({})", backoff.max_delay_ms),
            ));
        }

        debug!(
            queue = %name,
            capacity,
            min_delay_ms = backoff.min_delay_ms,
            max_delay_ms = backoff.max_delay_ms,
            "Polling work queue created"
        );

        Ok(Self {
            inner: Arc::new(PollingInner {
                monitor: ChannelMonitor::new(name.clone(), capacity),
                name,
                capacity,
                buffer: Mutex::new(VecDeque::with_capacity(capacity)),
                closed: AtomicBool::new(false),
                backoff: JitteredBackoff::from_config(backoff),
            }),
        })
    }

    pub fn from_config(
        queue: &QueueConfig,
        backoff: &BackoffConfig,
    ) -> Result<Self, ConfigurationError> {
        Self::new(queue.name.clone(), queue.capacity, backoff)
    }

    fn closed_error(&self) -> MessagingError {
        MessagingError::queue_closed(self.inner.name.as_str())
    }

    /// Single insertion attempt; hands the message back when full
    fn attempt_put(&self, message: QueueMessage<T>) -> MessagingResult<Option<QueueMessage<T>>> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }

        let mut buffer = self.inner.buffer.lock();
        if buffer.len() >= self.inner.capacity {
            return Ok(Some(message));
        }

        let is_termination = message.is_termination();
        let iteration = message.iteration;
        buffer.push_back(message);
        drop(buffer);

        self.inner.monitor.record_send(is_termination);
        trace!(queue = %self.inner.name, iteration, "Message enqueued");
        Ok(None)
    }

    fn attempt_get(&self) -> Option<QueueMessage<T>> {
        let message = self.inner.buffer.lock().pop_front()?;
        self.inner.monitor.record_receive();
        trace!(queue = %self.inner.name, iteration = message.iteration, "Message dequeued");
        Some(message)
    }
}

impl<T: Send> WorkQueue<T> for PollingWorkQueue<T> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn capacity(&self) -> usize {
        self.inner.capacity
    }

    fn len(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn put_message(
        &self,
        message: QueueMessage<T>,
        timeout: Option<Duration>,
    ) -> MessagingResult<()> {
        let deadline = deadline_after(timeout);
        let mut pending = message;
        let mut waited = false;

        loop {
            pending = match self.attempt_put(pending)? {
                None => return Ok(()),
                Some(message) => message,
            };

            if !waited {
                waited = true;
                self.inner.monitor.record_backpressure();
                debug!(
                    queue = %self.inner.name,
                    iteration = pending.iteration,
                    capacity = self.inner.capacity,
                    "Queue full, retrying with backoff"
                );
            }

            if !self.inner.backoff.sleep_until(deadline) {
                self.inner.monitor.record_timeout();
                return Err(MessagingError::timeout(
                    self.inner.name.as_str(),
                    "put",
                    timeout.unwrap_or_default(),
                ));
            }
            self.inner.monitor.record_retry();
        }
    }

    fn try_put_message(&self, message: QueueMessage<T>) -> MessagingResult<()> {
        match self.attempt_put(message)? {
            None => Ok(()),
            Some(_) => {
                self.inner.monitor.record_backpressure();
                Err(MessagingError::queue_full(
                    self.inner.name.as_str(),
                    self.inner.capacity,
                ))
            }
        }
    }

    fn get_message(&self, timeout: Option<Duration>) -> MessagingResult<QueueMessage<T>> {
        let deadline = deadline_after(timeout);
        let mut waited = false;

        loop {
            if let Some(message) = self.try_get()? {
                return Ok(message);
            }

            if !waited {
                waited = true;
                self.inner.monitor.record_empty_wait();
                trace!(queue = %self.inner.name, "Queue empty, retrying with backoff");
            }

            if !self.inner.backoff.sleep_until(deadline) {
                self.inner.monitor.record_timeout();
                return Err(MessagingError::timeout(
                    self.inner.name.as_str(),
                    "get",
                    timeout.unwrap_or_default(),
                ));
            }
            self.inner.monitor.record_retry();
        }
    }

    fn try_get(&self) -> MessagingResult<Option<QueueMessage<T>>> {
        match self.attempt_get() {
            Some(message) => Ok(Some(message)),
            None if self.is_closed() => Err(self.closed_error()),
            None => Ok(None),
        }
    }

    fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            info!(
                queue = %self.inner.name,
                buffered = self.len(),
                "Work queue closed"
            );
        }
    }

    fn metrics(&self) -> ChannelMetrics {
        self.inner.monitor.snapshot(self.len())
    }
}
