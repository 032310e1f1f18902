//! End-to-end runs of the async pipeline runner

mod common;

use async_trait::async_trait;
use common::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use workqueue_core::{
    Destination, PipelineRunner, Result, Source, WorkQueue, WorkQueueConfig, WorkQueueError,
};

/// Emits `batches` batches of `batch_size` sequential ids
struct CountingSource {
    next_id: u64,
    batches_left: u64,
    batch_size: u64,
    fail_after: Option<u64>,
}

impl CountingSource {
    fn new(batches: u64, batch_size: u64) -> Self {
        Self {
            next_id: 0,
            batches_left: batches,
            batch_size,
            fail_after: None,
        }
    }

    fn failing_after(mut self, batches: u64) -> Self {
        self.fail_after = Some(batches);
        self
    }
}

#[async_trait]
impl Source<u64> for CountingSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<u64>>> {
        if let Some(0) = self.fail_after {
            return Err(WorkQueueError::source_failed("upstream connection reset"));
        }
        if self.batches_left == 0 {
            return Ok(None);
        }
        self.batches_left -= 1;
        self.fail_after = self.fail_after.map(|n| n - 1);

        let start = self.next_id;
        self.next_id += self.batch_size;
        Ok(Some((start..self.next_id).collect()))
    }
}

#[derive(Clone, Default)]
struct Recorded {
    writes: Arc<Mutex<Vec<(String, u64, Vec<u64>)>>>,
    finished: Arc<Mutex<Vec<String>>>,
}

struct RecordingDestination {
    name: String,
    recorded: Recorded,
    delay: Duration,
    fail_on_iteration: Option<u64>,
}

impl RecordingDestination {
    fn boxed(name: &str, recorded: &Recorded) -> Box<dyn Destination<u64>> {
        Box::new(Self {
            name: name.to_string(),
            recorded: recorded.clone(),
            delay: Duration::ZERO,
            fail_on_iteration: None,
        })
    }
}

#[async_trait]
impl Destination<u64> for RecordingDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, iteration: u64, records: Vec<u64>) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on_iteration == Some(iteration) {
            return Err(WorkQueueError::destination_failed(
                self.name.clone(),
                format!("rejected iteration {iteration}"),
            ));
        }
        self.recorded
            .writes
            .lock()
            .push((self.name.clone(), iteration, records));
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.recorded.finished.lock().push(self.name.clone());
        Ok(())
    }
}

#[tokio::test]
async fn fan_out_delivers_every_batch_exactly_once() {
    init_test_logging();
    let recorded = Recorded::default();
    let runner = PipelineRunner::new(bounded_queue("fan_out", 2));

    let destinations = vec![
        RecordingDestination::boxed("alpha", &recorded),
        RecordingDestination::boxed("beta", &recorded),
        RecordingDestination::boxed("gamma", &recorded),
    ];

    let report = runner
        .run(CountingSource::new(50, 4), destinations)
        .await
        .unwrap();

    assert_eq!(report.batches_produced, 50);
    assert_eq!(report.records_produced, 200);
    assert_eq!(report.batches_consumed(), 50);
    assert_eq!(report.destinations.len(), 3);
    assert_eq!(report.queue_metrics.terminations_sent, 3);
    assert_eq!(report.queue_metrics.depth, 0);

    let writes = recorded.writes.lock();
    let iterations: HashSet<u64> = writes.iter().map(|(_, iteration, _)| *iteration).collect();
    assert_eq!(writes.len(), 50);
    assert_eq!(iterations, (0..50).collect::<HashSet<_>>());

    let records: HashSet<u64> = writes.iter().flat_map(|(_, _, r)| r.iter().copied()).collect();
    assert_eq!(records.len(), 200);

    let mut finished = recorded.finished.lock().clone();
    finished.sort();
    assert_eq!(finished, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn single_destination_sees_batches_in_order() {
    let recorded = Recorded::default();
    let runner = PipelineRunner::new(bounded_queue("ordered", 1));

    runner
        .run(
            CountingSource::new(20, 1),
            vec![RecordingDestination::boxed("only", &recorded)],
        )
        .await
        .unwrap();

    let iterations: Vec<u64> = recorded.writes.lock().iter().map(|(_, i, _)| *i).collect();
    assert_eq!(iterations, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn slow_destination_applies_backpressure() {
    let recorded = Recorded::default();
    let runner = PipelineRunner::new(bounded_queue("slow", 1));
    let slow: Box<dyn Destination<u64>> = Box::new(RecordingDestination {
        name: "slow".to_string(),
        recorded: recorded.clone(),
        delay: Duration::from_millis(5),
        fail_on_iteration: None,
    });

    let report = runner.run(CountingSource::new(10, 2), vec![slow]).await.unwrap();

    assert_eq!(report.batches_consumed(), 10);
    assert!(report.queue_metrics.backpressure_events > 0);
}

#[tokio::test]
async fn destination_failure_stops_the_pipeline() {
    let recorded = Recorded::default();
    let runner = PipelineRunner::new(bounded_queue("failing_sink", 2));
    let failing: Box<dyn Destination<u64>> = Box::new(RecordingDestination {
        name: "flaky".to_string(),
        recorded: recorded.clone(),
        delay: Duration::ZERO,
        fail_on_iteration: Some(3),
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        runner.run(CountingSource::new(1_000, 1), vec![failing]),
    )
    .await
    .expect("pipeline must not hang after a failure");

    match result {
        Err(WorkQueueError::Destination { destination, reason }) => {
            assert_eq!(destination, "flaky");
            assert!(reason.contains("iteration 3"));
        }
        other => panic!("expected destination error, got {other:?}"),
    }
    assert!(runner.queue().is_closed());
    assert!(recorded.finished.lock().is_empty());
}

#[tokio::test]
async fn source_failure_releases_waiting_destinations() {
    let recorded = Recorded::default();
    let runner = PipelineRunner::new(bounded_queue("failing_source", 4));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        runner.run(
            CountingSource::new(10, 1).failing_after(2),
            vec![
                RecordingDestination::boxed("a", &recorded),
                RecordingDestination::boxed("b", &recorded),
            ],
        ),
    )
    .await
    .expect("pipeline must not hang after a failure");

    assert!(matches!(result, Err(WorkQueueError::Source(_))));
    assert!(runner.queue().is_closed());
}

#[tokio::test]
async fn closed_queue_is_rejected_up_front() {
    let recorded = Recorded::default();
    let runner = PipelineRunner::new(bounded_queue("closed", 2));
    runner.queue().close();

    let result = runner
        .run(
            CountingSource::new(1, 1),
            vec![RecordingDestination::boxed("a", &recorded)],
        )
        .await;
    assert!(matches!(result, Err(WorkQueueError::Messaging(e)) if e.is_closed()));
}

#[test]
fn runner_from_config_runs_on_a_plain_runtime() {
    let mut config = WorkQueueConfig::default();
    config.queue.name = "configured".to_string();
    config.queue.capacity = 3;
    config.queue.get_timeout_ms = Some(5_000);

    let runner = PipelineRunner::from_config(&config).unwrap();
    let recorded = Recorded::default();

    let report = tokio_test::block_on(runner.run(
        CountingSource::new(5, 3),
        vec![RecordingDestination::boxed("sink", &recorded)],
    ));

    let report = tokio_test::assert_ok!(report);
    assert_eq!(report.records_produced, 15);
    assert_eq!(report.queue_metrics.queue_name, "configured");
}
