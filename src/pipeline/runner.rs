//! # Pipeline Runner
//!
//! Drives one [`Source`] into any number of [`Destination`]s through a
//! [`BoundedWorkQueue`]. The source runs on a producer task that numbers
//! batches from zero and finishes with one termination message per
//! destination. Each destination runs on its own consumer task.
//!
//! The first failure anywhere is recorded and the queue is closed, which
//! releases every other task. `run` then returns that first error.
//!
//! Dropping the `run` future before it resolves closes the queue and aborts
//! the producer and consumer tasks.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::consumer::Consumer;
use super::producer::Producer;
use crate::config::{ConfigResult, ConfigurationError, WorkQueueConfig};
use crate::error::{Result, WorkQueueError};
use crate::logging::log_error;
use crate::messaging::{BoundedWorkQueue, MessagingError, WorkQueue};
use crate::monitoring::ChannelMetrics;

/// Upstream supplier of record batches
#[async_trait]
pub trait Source<T>: Send {
    /// Next batch, or `None` when the source is exhausted.
    ///
    /// Empty batches are skipped.
    async fn next_batch(&mut self) -> Result<Option<Vec<T>>>;
}

/// Downstream sink for record batches
#[async_trait]
pub trait Destination<T>: Send {
    fn name(&self) -> &str;

    async fn write(&mut self, iteration: u64, records: Vec<T>) -> Result<()>;

    /// Called once after the termination message arrives
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Per-destination totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationReport {
    pub name: String,
    pub batches: u64,
    pub records: usize,
}

/// Outcome of a successful [`PipelineRunner::run`]
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub batches_produced: u64,
    pub records_produced: usize,
    pub destinations: Vec<DestinationReport>,
    pub queue_metrics: ChannelMetrics,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Batches written across all destinations
    pub fn batches_consumed(&self) -> u64 {
        self.destinations.iter().map(|d| d.batches).sum()
    }
}

/// Records the first failure and closes the queue
struct FailureLatch<T> {
    queue: BoundedWorkQueue<T>,
    first: Mutex<Option<WorkQueueError>>,
}

impl<T: Send> FailureLatch<T> {
    fn fail(&self, task: &str, err: WorkQueueError) -> WorkQueueError {
        {
            let mut first = self.first.lock();
            if first.is_none() {
                log_error(task, "pipeline_run", &err.to_string(), Some(self.queue.name()));
                *first = Some(err.clone());
            } else {
                debug!(queue = %self.queue.name(), task, error = %err, "Pipeline task stopped");
            }
        }
        self.queue.close();
        err
    }

    fn take(&self) -> Option<WorkQueueError> {
        self.first.lock().take()
    }
}

/// Tears down an unfinished run when its future is dropped
struct RunGuard<T: Send> {
    queue: BoundedWorkQueue<T>,
    tasks: Vec<AbortHandle>,
    completed: bool,
}

impl<T: Send> Drop for RunGuard<T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        self.queue.close();
        for task in &self.tasks {
            task.abort();
        }
        warn!(
            queue = %self.queue.name(),
            tasks = self.tasks.len(),
            "Pipeline run dropped before completion, tasks aborted"
        );
    }
}

struct ProducerTotals {
    batches: u64,
    records: usize,
}

pub struct PipelineRunner<T> {
    queue: BoundedWorkQueue<T>,
    put_timeout: Option<Duration>,
    get_timeout: Option<Duration>,
}

impl<T: Send + 'static> PipelineRunner<T> {
    pub fn new(queue: BoundedWorkQueue<T>) -> Self {
        Self {
            queue,
            put_timeout: None,
            get_timeout: None,
        }
    }

    /// Build the queue and deadlines from configuration
    pub fn from_config(config: &WorkQueueConfig) -> ConfigResult<Self> {
        config.validate()?;
        let queue = BoundedWorkQueue::from_config(&config.queue)?;
        Ok(Self::new(queue).with_timeouts(config.queue.put_timeout(), config.queue.get_timeout()))
    }

    pub fn with_timeouts(mut self, put: Option<Duration>, get: Option<Duration>) -> Self {
        self.put_timeout = put;
        self.get_timeout = get;
        self
    }

    pub fn queue(&self) -> &BoundedWorkQueue<T> {
        &self.queue
    }

    /// Run the source to exhaustion and deliver every batch to exactly one
    /// destination.
    pub async fn run<S>(
        &self,
        source: S,
        destinations: Vec<Box<dyn Destination<T>>>,
    ) -> Result<PipelineReport>
    where
        S: Source<T> + 'static,
    {
        if destinations.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "destinations",
                "0",
                "a pipeline needs at least one destination",
            )
            .into());
        }
        if self.queue.is_closed() {
            return Err(MessagingError::queue_closed(self.queue.name()).into());
        }

        let started = Instant::now();
        let consumer_count = destinations.len();
        let latch = Arc::new(FailureLatch {
            queue: self.queue.clone(),
            first: Mutex::new(None),
        });

        info!(
            queue = %self.queue.name(),
            capacity = self.queue.capacity(),
            destinations = consumer_count,
            "Pipeline started"
        );

        let consumers: Vec<_> = destinations
            .into_iter()
            .map(|destination| {
                let consumer = Consumer::new(self.queue.clone()).with_timeout(self.get_timeout);
                let latch = Arc::clone(&latch);
                tokio::spawn(async move { drain_into(consumer, destination, &latch).await })
            })
            .collect();

        let producer = Producer::new(self.queue.clone()).with_timeout(self.put_timeout);
        let producer_latch = Arc::clone(&latch);
        let producer_task = tokio::spawn(async move {
            produce_from(source, producer, consumer_count, &producer_latch).await
        });

        let mut tasks: Vec<AbortHandle> = consumers.iter().map(|task| task.abort_handle()).collect();
        tasks.push(producer_task.abort_handle());
        let mut guard = RunGuard {
            queue: self.queue.clone(),
            tasks,
            completed: false,
        };

        let producer_outcome = producer_task.await;
        let consumer_outcomes = join_all(consumers).await;
        guard.completed = true;

        if let Some(first) = latch.take() {
            return Err(first);
        }

        let totals = producer_outcome??;
        let mut reports = Vec::with_capacity(consumer_count);
        for outcome in consumer_outcomes {
            reports.push(outcome??);
        }

        let report = PipelineReport {
            batches_produced: totals.batches,
            records_produced: totals.records,
            destinations: reports,
            queue_metrics: self.queue.metrics(),
            elapsed: started.elapsed(),
        };

        info!(
            queue = %self.queue.name(),
            batches = report.batches_produced,
            records = report.records_produced,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Pipeline completed"
        );
        Ok(report)
    }
}

async fn produce_from<T, S>(
    mut source: S,
    mut producer: Producer<T, BoundedWorkQueue<T>>,
    consumer_count: usize,
    latch: &FailureLatch<T>,
) -> Result<ProducerTotals>
where
    T: Send + 'static,
    S: Source<T>,
{
    let mut records_produced = 0usize;

    loop {
        let records = match source.next_batch().await {
            Ok(Some(records)) => records,
            Ok(None) => break,
            Err(e) => return Err(latch.fail("producer", e)),
        };
        if records.is_empty() {
            continue;
        }

        let count = records.len();
        if let Err(e) = producer.send_async(records).await {
            return Err(latch.fail("producer", e.into()));
        }
        records_produced += count;
    }

    let batches = producer.next_iteration();
    if !producer.finish_async(consumer_count).await {
        let err = MessagingError::queue_closed(producer.queue().name());
        return Err(latch.fail("producer", err.into()));
    }

    Ok(ProducerTotals {
        batches,
        records: records_produced,
    })
}

async fn drain_into<T>(
    mut consumer: Consumer<T, BoundedWorkQueue<T>>,
    mut destination: Box<dyn Destination<T>>,
    latch: &FailureLatch<T>,
) -> Result<DestinationReport>
where
    T: Send + 'static,
{
    let name = destination.name().to_string();
    let mut records = 0usize;

    loop {
        let message = match consumer.recv_async().await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => return Err(latch.fail(&name, e.into())),
        };

        let (iteration, batch) = message.into_parts();
        let count = batch.len();
        if let Err(e) = destination.write(iteration, batch).await {
            return Err(latch.fail(&name, e));
        }
        records += count;
    }

    if let Err(e) = destination.finish().await {
        return Err(latch.fail(&name, e));
    }

    debug!(destination = %name, batches = consumer.received(), records, "Destination drained");
    Ok(DestinationReport {
        name,
        batches: consumer.received(),
        records,
    })
}
