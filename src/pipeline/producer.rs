//! # Producer
//!
//! Owns the iteration counter for one stream of batches and the termination
//! fan-out at the end of the stream.

use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::messaging::{BoundedWorkQueue, MessagingError, MessagingResult, QueueMessage, WorkQueue};

/// Sending side of a work queue.
///
/// Batches are numbered from the starting iteration upwards, one per send.
pub struct Producer<T, Q> {
    queue: Q,
    next_iteration: u64,
    exhausted: bool,
    timeout: Option<Duration>,
    _records: PhantomData<fn(T)>,
}

impl<T, Q> Producer<T, Q>
where
    Q: WorkQueue<T>,
{
    pub fn new(queue: Q) -> Self {
        Self::starting_at(queue, 0)
    }

    /// Resume numbering at `iteration`
    pub fn starting_at(queue: Q, iteration: u64) -> Self {
        Self {
            queue,
            next_iteration: iteration,
            exhausted: false,
            timeout: None,
            _records: PhantomData,
        }
    }

    /// Give up on a full queue after `timeout` instead of waiting indefinitely
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Iteration the next batch will carry
    pub fn next_iteration(&self) -> u64 {
        self.next_iteration
    }

    /// Enqueue a batch under the next iteration number and return that number.
    ///
    /// Fails with [`MessagingError::IterationExhausted`] once a batch has been
    /// sent as `u64::MAX`.
    pub fn send(&mut self, records: Vec<T>) -> MessagingResult<u64> {
        let iteration = self.claim_iteration()?;
        self.send_with_iteration(records, iteration)?;
        Ok(iteration)
    }

    /// Enqueue a batch under an explicit iteration number.
    ///
    /// Later sends continue numbering after the larger of `iteration` and the
    /// current counter.
    pub fn send_with_iteration(&mut self, records: Vec<T>, iteration: u64) -> MessagingResult<()> {
        let message = QueueMessage::batch(records, iteration)?;
        self.queue.put_message(message, self.timeout)?;
        self.advance_past(iteration);
        Ok(())
    }

    /// Enqueue one termination message per consumer.
    ///
    /// Returns `false` as soon as a sentinel cannot be delivered.
    pub fn finish(&mut self, consumer_count: usize) -> bool {
        let iteration = self.next_iteration;
        for delivered in 0..consumer_count {
            if let Err(e) = self
                .queue
                .put_message(QueueMessage::termination(iteration), self.timeout)
            {
                warn!(
                    queue = %self.queue.name(),
                    iteration,
                    delivered,
                    consumer_count,
                    error = %e,
                    "Termination fan-out incomplete"
                );
                return false;
            }
        }
        info!(queue = %self.queue.name(), iteration, consumer_count, "Producer finished");
        true
    }

    fn claim_iteration(&self) -> MessagingResult<u64> {
        if self.exhausted {
            return Err(MessagingError::iteration_exhausted(
                self.queue.name(),
                self.next_iteration,
            ));
        }
        Ok(self.next_iteration)
    }

    fn advance_past(&mut self, iteration: u64) {
        match iteration.checked_add(1) {
            Some(next) => self.next_iteration = self.next_iteration.max(next),
            None => {
                self.next_iteration = iteration;
                self.exhausted = true;
                warn!(queue = %self.queue.name(), iteration, "Iteration numbers exhausted");
            }
        }
        debug!(queue = %self.queue.name(), iteration, "Batch sent");
    }
}

impl<T: Send + 'static> Producer<T, BoundedWorkQueue<T>> {
    /// Async [`Producer::send`]
    pub async fn send_async(&mut self, records: Vec<T>) -> MessagingResult<u64> {
        let iteration = self.claim_iteration()?;
        let message = QueueMessage::batch(records, iteration)?;
        self.queue.put_message_async(message, self.timeout).await?;
        self.advance_past(iteration);
        Ok(iteration)
    }

    /// Async [`Producer::finish`]
    pub async fn finish_async(&mut self, consumer_count: usize) -> bool {
        let iteration = self.next_iteration;
        for delivered in 0..consumer_count {
            if let Err(e) = self
                .queue
                .put_message_async(QueueMessage::termination(iteration), self.timeout)
                .await
            {
                warn!(
                    queue = %self.queue.name(),
                    iteration,
                    delivered,
                    consumer_count,
                    error = %e,
                    "Termination fan-out incomplete"
                );
                return false;
            }
        }
        info!(queue = %self.queue.name(), iteration, consumer_count, "Producer finished");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_numbers_batches_from_zero() {
        let queue = BoundedWorkQueue::new(4).unwrap();
        let mut producer = Producer::new(queue.clone());

        assert_eq!(producer.send(vec!["a"]).unwrap(), 0);
        assert_eq!(producer.send(vec!["b", "c"]).unwrap(), 1);
        assert_eq!(producer.next_iteration(), 2);

        assert_eq!(queue.get().unwrap().records, vec!["a"]);
        assert_eq!(queue.get().unwrap().iteration, 1);
    }

    #[test]
    fn test_explicit_iteration_moves_counter_forward_only() {
        let queue = BoundedWorkQueue::new(4).unwrap();
        let mut producer = Producer::starting_at(queue, 5);

        producer.send_with_iteration(vec![1], 10).unwrap();
        assert_eq!(producer.next_iteration(), 11);

        producer.send_with_iteration(vec![2], 3).unwrap();
        assert_eq!(producer.next_iteration(), 11);
    }

    #[test]
    fn test_empty_batch_is_rejected_and_counter_kept() {
        let queue = BoundedWorkQueue::<u8>::new(2).unwrap();
        let mut producer = Producer::new(queue.clone());

        assert!(matches!(
            producer.send(Vec::new()),
            Err(MessagingError::InvalidMessage { .. })
        ));
        assert_eq!(producer.next_iteration(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_finish_sends_one_sentinel_per_consumer() {
        let queue = BoundedWorkQueue::<u8>::new(4).unwrap();
        let mut producer = Producer::new(queue.clone());
        producer.send(vec![7]).unwrap();

        assert!(producer.finish(3));
        assert_eq!(queue.len(), 4);
        assert!(!queue.get().unwrap().is_termination());
        for _ in 0..3 {
            let sentinel = queue.get().unwrap();
            assert!(sentinel.is_termination());
            assert_eq!(sentinel.iteration, 1);
        }
    }

    #[test]
    fn test_finish_reports_closed_queue() {
        let queue = BoundedWorkQueue::<u8>::new(4).unwrap();
        let mut producer = Producer::new(queue.clone());
        queue.close();
        assert!(!producer.finish(1));
    }

    #[test]
    fn test_send_timeout_on_full_queue() {
        let queue = BoundedWorkQueue::new(1).unwrap();
        let mut producer =
            Producer::new(queue).with_timeout(Some(Duration::from_millis(10)));
        producer.send(vec![1]).unwrap();

        let err = producer.send(vec![2]).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(producer.next_iteration(), 1);
    }

    #[tokio::test]
    async fn test_async_send_and_finish() {
        let queue = BoundedWorkQueue::new(3).unwrap();
        let mut producer = Producer::new(queue.clone());

        assert_eq!(producer.send_async(vec!['x']).await.unwrap(), 0);
        assert!(producer.finish_async(2).await);

        assert_eq!(queue.get_async().await.unwrap().records, vec!['x']);
        assert!(queue.get_async().await.unwrap().is_termination());
        assert!(queue.get_async().await.unwrap().is_termination());
    }

    #[test]
    fn test_send_fails_once_iterations_are_exhausted() {
        let queue = BoundedWorkQueue::with_name("exhausted", 4).unwrap();
        let mut producer = Producer::new(queue.clone());

        producer.send_with_iteration(vec![1], u64::MAX).unwrap();
        assert_eq!(producer.next_iteration(), u64::MAX);

        assert!(matches!(
            producer.send(vec![2]),
            Err(MessagingError::IterationExhausted {
                last_iteration: u64::MAX,
                ..
            })
        ));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().unwrap().iteration, u64::MAX);
    }

    #[tokio::test]
    async fn test_send_async_fails_once_iterations_are_exhausted() {
        let queue = BoundedWorkQueue::new(2).unwrap();
        let mut producer = Producer::starting_at(queue.clone(), u64::MAX);

        assert_eq!(producer.send_async(vec!['a']).await.unwrap(), u64::MAX);
        assert!(producer.send_async(vec!['b']).await.is_err());
        assert_eq!(queue.len(), 1);
    }
}
