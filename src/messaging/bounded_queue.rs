//! # Bounded Work Queue
//!
//! Channel-backed [`WorkQueue`]. Full and empty conditions park the calling
//! thread on the channel and wake it as soon as the condition clears, so
//! waiting costs no CPU. Cancellation uses a second channel whose sender is
//! dropped by [`WorkQueue::close`], which wakes every waiter at once.
//!
//! Async callers never park a thread. They retry the non-blocking path and
//! sleep on a [`Notify`] that every send, receive and close signals, so a
//! dropped async future has taken nothing off the queue.

use crossbeam::channel::{self, Receiver, Select, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use super::errors::{MessagingError, MessagingResult};
use super::message::{QueueMessage, QueueSignal};
use super::queue::{deadline_after, WorkQueue};
use crate::config::{ConfigurationError, QueueConfig};
use crate::monitoring::{ChannelMetrics, ChannelMonitor};

/// Fixed-capacity FIFO queue of batches.
///
/// Cloning yields another handle to the same queue.
pub struct BoundedWorkQueue<T> {
    name: Arc<str>,
    capacity: usize,
    sender: Sender<QueueMessage<T>>,
    receiver: Receiver<QueueMessage<T>>,
    shutdown_tx: Arc<Mutex<Option<Sender<()>>>>,
    shutdown_rx: Receiver<()>,
    message_ready: Arc<Notify>,
    space_freed: Arc<Notify>,
    monitor: Arc<ChannelMonitor>,
}

impl<T> Clone for BoundedWorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            capacity: self.capacity,
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            shutdown_rx: self.shutdown_rx.clone(),
            message_ready: Arc::clone(&self.message_ready),
            space_freed: Arc::clone(&self.space_freed),
            monitor: Arc::clone(&self.monitor),
        }
    }
}

impl<T> std::fmt::Debug for BoundedWorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedWorkQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.sender.len())
            .field("closed", &self.shutdown_tx.lock().is_none())
            .finish()
    }
}

impl<T> BoundedWorkQueue<T> {
    /// Create an unnamed queue holding at most `capacity` messages
    pub fn new(capacity: usize) -> Result<Self, ConfigurationError> {
        Self::with_name("default", capacity)
    }

    pub fn with_name(name: impl Into<String>, capacity: usize) -> Result<Self, ConfigurationError> {
        let name: String = name.into();
        if capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "capacity",
                "0",
                format!("queue '{name}' needs room for at least one message"),
            ));
        }

        let (sender, receiver) = channel::bounded(capacity);
        let (shutdown_tx, shutdown_rx) = channel::bounded(0);
        let monitor = Arc::new(ChannelMonitor::new(name.clone(), capacity));

        debug!(queue = %name, capacity, "Bounded work queue created");

        Ok(Self {
            name: Arc::from(name),
            capacity,
            sender,
            receiver,
            shutdown_tx: Arc::new(Mutex::new(Some(shutdown_tx))),
            shutdown_rx,
            message_ready: Arc::new(Notify::new()),
            space_freed: Arc::new(Notify::new()),
            monitor,
        })
    }

    pub fn from_config(config: &QueueConfig) -> Result<Self, ConfigurationError> {
        Self::with_name(config.name.clone(), config.capacity)
    }

    /// Shared counters for this queue
    pub fn monitor(&self) -> &Arc<ChannelMonitor> {
        &self.monitor
    }

    fn closed_error(&self) -> MessagingError {
        MessagingError::queue_closed(self.name.as_ref())
    }

    fn record_sent(&self, is_termination: bool, iteration: u64) {
        self.monitor.record_send(is_termination);
        self.message_ready.notify_waiters();
        trace!(queue = %self.name, iteration, "Message enqueued");
    }

    fn record_received(&self, message: &QueueMessage<T>) {
        self.monitor.record_receive();
        self.space_freed.notify_waiters();
        trace!(queue = %self.name, iteration = message.iteration, "Message dequeued");
    }
}

impl<T: Send> WorkQueue<T> for BoundedWorkQueue<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.sender.len()
    }

    fn is_closed(&self) -> bool {
        self.shutdown_tx.lock().is_none()
    }

    fn put_message(
        &self,
        message: QueueMessage<T>,
        timeout: Option<Duration>,
    ) -> MessagingResult<()> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let is_termination = message.is_termination();
        let iteration = message.iteration;

        let message = match self.sender.try_send(message) {
            Ok(()) => {
                self.record_sent(is_termination, iteration);
                return Ok(());
            }
            Err(TrySendError::Full(message)) => message,
            Err(TrySendError::Disconnected(_)) => {
                return Err(MessagingError::internal("queue receiver disconnected"))
            }
        };

        self.monitor.record_backpressure();
        debug!(
            queue = %self.name,
            iteration,
            capacity = self.capacity,
            "Queue full, waiting for a free slot"
        );

        let deadline = deadline_after(timeout);
        let mut select = Select::new();
        let send_index = select.send(&self.sender);
        select.recv(&self.shutdown_rx);

        let operation = match deadline {
            Some(deadline) => match select.select_deadline(deadline) {
                Ok(operation) => operation,
                Err(_) => {
                    self.monitor.record_timeout();
                    return Err(MessagingError::timeout(
                        self.name.as_ref(),
                        "put",
                        timeout.unwrap_or_default(),
                    ));
                }
            },
            None => select.select(),
        };

        if operation.index() == send_index {
            operation
                .send(&self.sender, message)
                .map_err(|_| MessagingError::internal("queue receiver disconnected"))?;
            self.record_sent(is_termination, iteration);
            Ok(())
        } else {
            let _ = operation.recv(&self.shutdown_rx);
            Err(self.closed_error())
        }
    }

    fn try_put_message(&self, message: QueueMessage<T>) -> MessagingResult<()> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let is_termination = message.is_termination();
        let iteration = message.iteration;

        match self.sender.try_send(message) {
            Ok(()) => {
                self.record_sent(is_termination, iteration);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.monitor.record_backpressure();
                Err(MessagingError::queue_full(self.name.as_ref(), self.capacity))
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(MessagingError::internal("queue receiver disconnected"))
            }
        }
    }

    fn get_message(&self, timeout: Option<Duration>) -> MessagingResult<QueueMessage<T>> {
        if let Some(message) = self.try_get()? {
            return Ok(message);
        }

        self.monitor.record_empty_wait();
        trace!(queue = %self.name, "Queue empty, waiting for a message");

        let deadline = deadline_after(timeout);
        let mut select = Select::new();
        let recv_index = select.recv(&self.receiver);
        select.recv(&self.shutdown_rx);

        let operation = match deadline {
            Some(deadline) => match select.select_deadline(deadline) {
                Ok(operation) => operation,
                Err(_) => {
                    self.monitor.record_timeout();
                    return Err(MessagingError::timeout(
                        self.name.as_ref(),
                        "get",
                        timeout.unwrap_or_default(),
                    ));
                }
            },
            None => select.select(),
        };

        if operation.index() == recv_index {
            let message = operation
                .recv(&self.receiver)
                .map_err(|_| MessagingError::internal("queue sender disconnected"))?;
            self.record_received(&message);
            return Ok(message);
        }

        let _ = operation.recv(&self.shutdown_rx);
        // A message may have landed while the queue was closing
        match self.receiver.try_recv() {
            Ok(message) => {
                self.record_received(&message);
                Ok(message)
            }
            Err(_) => Err(self.closed_error()),
        }
    }

    fn try_get(&self) -> MessagingResult<Option<QueueMessage<T>>> {
        match self.receiver.try_recv() {
            Ok(message) => {
                self.record_received(&message);
                Ok(Some(message))
            }
            Err(TryRecvError::Empty) if self.is_closed() => Err(self.closed_error()),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(MessagingError::internal("queue sender disconnected"))
            }
        }
    }

    fn close(&self) {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().take() {
            drop(shutdown_tx);
            self.message_ready.notify_waiters();
            self.space_freed.notify_waiters();
            info!(
                queue = %self.name,
                buffered = self.sender.len(),
                "Work queue closed"
            );
        }
    }

    fn metrics(&self) -> ChannelMetrics {
        self.monitor.snapshot(self.sender.len())
    }
}

impl<T: Send> BoundedWorkQueue<T> {
    /// Async [`WorkQueue::put`].
    ///
    /// Cancel safe: if the future is dropped before it resolves, the batch
    /// was not enqueued.
    pub async fn put_async(
        &self,
        records: Vec<T>,
        iteration: u64,
        signal: Option<QueueSignal>,
    ) -> MessagingResult<()> {
        let message = QueueMessage::new(records, iteration, signal)?;
        self.put_message_async(message, None).await
    }

    /// Async [`WorkQueue::put_message`]. Cancel safe.
    pub async fn put_message_async(
        &self,
        message: QueueMessage<T>,
        timeout: Option<Duration>,
    ) -> MessagingResult<()> {
        let is_termination = message.is_termination();
        let iteration = message.iteration;
        let deadline = async_deadline(timeout);
        let mut message = message;
        let mut waited = false;

        loop {
            // Registered before the attempt so a slot freed in between still wakes us
            let notified = self.space_freed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(self.closed_error());
            }
            message = match self.sender.try_send(message) {
                Ok(()) => {
                    self.record_sent(is_termination, iteration);
                    return Ok(());
                }
                Err(TrySendError::Full(message)) => message,
                Err(TrySendError::Disconnected(_)) => {
                    return Err(MessagingError::internal("queue receiver disconnected"))
                }
            };

            if !waited {
                waited = true;
                self.monitor.record_backpressure();
                debug!(
                    queue = %self.name,
                    iteration,
                    capacity = self.capacity,
                    "Queue full, awaiting a free slot"
                );
            }
            self.wait_for(notified, deadline, timeout, "put").await?;
        }
    }

    /// Async [`WorkQueue::get`]
    pub async fn get_async(&self) -> MessagingResult<QueueMessage<T>> {
        self.get_message_async(None).await
    }

    /// Async [`WorkQueue::get_message`].
    ///
    /// Cancel safe: a message is only taken off the queue in the poll that
    /// returns it.
    pub async fn get_message_async(
        &self,
        timeout: Option<Duration>,
    ) -> MessagingResult<QueueMessage<T>> {
        let deadline = async_deadline(timeout);
        let mut waited = false;

        loop {
            let notified = self.message_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_get()? {
                return Ok(message);
            }

            if !waited {
                waited = true;
                self.monitor.record_empty_wait();
                trace!(queue = %self.name, "Queue empty, awaiting a message");
            }
            self.wait_for(notified, deadline, timeout, "get").await?;
        }
    }

    /// Async [`WorkQueue::terminate`]
    pub async fn terminate_async(&self, iteration: u64) -> bool {
        match self
            .put_message_async(QueueMessage::termination(iteration), None)
            .await
        {
            Ok(()) => {
                info!(queue = %self.name, iteration, "Termination signal enqueued");
                true
            }
            Err(e) => {
                warn!(
                    queue = %self.name,
                    iteration,
                    error = %e,
                    "Failed to enqueue termination signal"
                );
                false
            }
        }
    }

    async fn wait_for(
        &self,
        notified: Pin<&mut Notified<'_>>,
        deadline: Option<tokio::time::Instant>,
        timeout: Option<Duration>,
        operation: &str,
    ) -> MessagingResult<()> {
        let Some(deadline) = deadline else {
            notified.await;
            return Ok(());
        };
        tokio::time::timeout_at(deadline, notified)
            .await
            .map_err(|_| {
                self.monitor.record_timeout();
                MessagingError::timeout(self.name.as_ref(), operation, timeout.unwrap_or_default())
            })
    }
}

fn async_deadline(timeout: Option<Duration>) -> Option<tokio::time::Instant> {
    timeout.and_then(|t| tokio::time::Instant::now().checked_add(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(matches!(
            BoundedWorkQueue::<u32>::new(0),
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_config_uses_name_and_capacity() {
        let config = QueueConfig {
            name: "ingest".to_string(),
            capacity: 3,
            ..QueueConfig::default()
        };
        let queue = BoundedWorkQueue::<u32>::from_config(&config).unwrap();
        assert_eq!(queue.name(), "ingest");
        assert_eq!(queue.capacity(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_try_put_reports_full_queue() {
        let queue = BoundedWorkQueue::with_name("tiny", 1).unwrap();
        queue.try_put(vec![1], 0, None).unwrap();
        assert!(queue.is_full());

        assert!(matches!(
            queue.try_put(vec![2], 1, None),
            Err(MessagingError::QueueFull { capacity: 1, .. })
        ));
        assert_eq!(queue.metrics().backpressure_events, 1);
    }

    #[test]
    fn test_put_rejects_invalid_message_without_enqueuing() {
        let queue = BoundedWorkQueue::<u32>::new(2).unwrap();
        assert!(matches!(
            queue.put(Vec::new(), 0, None),
            Err(MessagingError::InvalidMessage { .. })
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_timeouts_on_full_and_empty_queue() {
        let queue = BoundedWorkQueue::with_name("deadlines", 1).unwrap();

        let started = Instant::now();
        assert!(matches!(
            queue.get_timeout(Duration::from_millis(20)),
            Err(MessagingError::Timeout { .. })
        ));
        assert!(started.elapsed() >= Duration::from_millis(20));

        queue.put(vec!["a"], 0, None).unwrap();
        assert!(matches!(
            queue.put_timeout(vec!["b"], 1, None, Duration::from_millis(20)),
            Err(MessagingError::Timeout { .. })
        ));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.metrics().timeouts, 2);
    }

    #[test]
    fn test_close_wakes_blocked_producer() {
        let queue = BoundedWorkQueue::with_name("closing", 1).unwrap();
        queue.put(vec![1], 0, None).unwrap();

        let producer = queue.clone();
        let handle = thread::spawn(move || producer.put(vec![2], 1, None));

        thread::sleep(Duration::from_millis(30));
        queue.close();

        assert!(matches!(
            handle.join().unwrap(),
            Err(MessagingError::QueueClosed { .. })
        ));
    }

    #[test]
    fn test_closed_queue_drains_before_failing() {
        let queue = BoundedWorkQueue::with_name("draining", 4).unwrap();
        queue.put(vec![1], 0, None).unwrap();
        queue.put(vec![2], 1, None).unwrap();
        queue.close();
        queue.close();

        assert!(queue.is_closed());
        assert!(matches!(
            queue.put(vec![3], 2, None),
            Err(MessagingError::QueueClosed { .. })
        ));
        assert!(!queue.terminate(3));

        assert_eq!(queue.get().unwrap().iteration, 0);
        assert_eq!(queue.get().unwrap().iteration, 1);
        assert!(matches!(
            queue.get(),
            Err(MessagingError::QueueClosed { .. })
        ));
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let queue = BoundedWorkQueue::<u32>::with_name("idle", 1).unwrap();
        let consumer = queue.clone();
        let handle = thread::spawn(move || consumer.get());

        thread::sleep(Duration::from_millis(30));
        queue.close();

        assert!(handle.join().unwrap().unwrap_err().is_closed());
    }

    #[test]
    fn test_terminate_enqueues_sentinel() {
        let queue = BoundedWorkQueue::<String>::new(2).unwrap();
        assert!(queue.terminate(9));

        let message = queue.get().unwrap();
        assert!(message.is_termination());
        assert_eq!(message.iteration, 9);
        assert_eq!(queue.metrics().terminations_sent, 1);
    }

    #[tokio::test]
    async fn test_async_put_waits_for_async_get() {
        let queue = BoundedWorkQueue::with_name("async", 1).unwrap();
        queue.put_async(vec![1u32], 0, None).await.unwrap();

        let producer = queue.clone();
        let pending = tokio::spawn(async move { producer.put_async(vec![2], 1, None).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        assert_eq!(queue.get_async().await.unwrap().iteration, 0);
        pending.await.unwrap().unwrap();
        assert_eq!(queue.get_async().await.unwrap().iteration, 1);

        assert!(queue.terminate_async(2).await);
        assert!(queue.get_async().await.unwrap().is_termination());
    }

    #[tokio::test]
    async fn test_dropped_async_get_leaves_message_queued() {
        let queue = BoundedWorkQueue::with_name("abandoned-get", 2).unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(10), queue.get_async()).await;
        assert!(abandoned.is_err());

        queue.put(vec![7u32], 0, None).unwrap();
        assert_eq!(queue.len(), 1);

        let message = queue.get_timeout(Duration::from_millis(200)).unwrap();
        assert_eq!(message.records, vec![7]);
        assert_eq!(queue.metrics().messages_received, 1);
    }

    #[tokio::test]
    async fn test_dropped_async_put_enqueues_nothing() {
        let queue = BoundedWorkQueue::with_name("abandoned-put", 1).unwrap();
        queue.put(vec![1u32], 0, None).unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), queue.put_async(vec![2], 1, None)).await;
        assert!(abandoned.is_err());

        assert_eq!(queue.get_async().await.unwrap().iteration, 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.is_empty());
        assert_eq!(queue.metrics().messages_sent, 1);
    }

    #[tokio::test]
    async fn test_async_deadlines_and_close() {
        let queue = BoundedWorkQueue::<u32>::with_name("async-deadlines", 1).unwrap();

        let err = queue
            .get_message_async(Some(Duration::from_millis(15)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        queue.put(vec![1], 0, None).unwrap();
        let err = queue
            .put_message_async(QueueMessage::batch(vec![2], 1).unwrap(), Some(Duration::from_millis(15)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(queue.metrics().timeouts, 2);

        queue.get().unwrap();
        let waiter = queue.clone();
        let pending = tokio::spawn(async move { waiter.get_async().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        assert!(pending.await.unwrap().unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn test_blocking_put_wakes_async_get() {
        let queue = BoundedWorkQueue::with_name("mixed", 1).unwrap();
        let waiter = queue.clone();
        let pending = tokio::spawn(async move { waiter.get_async().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let producer = queue.clone();
        thread::spawn(move || producer.put(vec!["sync"], 0, None))
            .join()
            .unwrap()
            .unwrap();

        assert_eq!(pending.await.unwrap().unwrap().records, vec!["sync"]);
    }
}
