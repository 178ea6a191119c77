//! Tests for the dispatcher module

use super::*;
use crate::channel::BufferConfig;
use crate::config::{Backpressure, LoadGeneratorConfig, PoolConfig};
use crate::error::LoadGenError;
use crate::rate::{RateConfig, RateStep};
use crate::traits::{DataSource, Worker, WorkerError};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock DataSource
// ============================================================================

/// Yields 1..=end, optionally blocking before every item
struct SequenceSource {
    next: u32,
    end: u32,
    latency: Option<Duration>,
}

impl SequenceSource {
    fn new(end: u32) -> Self {
        Self {
            next: 0,
            end,
            latency: None,
        }
    }

    fn unbounded() -> Self {
        Self::new(u32::MAX)
    }

    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl DataSource<u32> for SequenceSource {
    fn has_next(&mut self, _elapsed: Duration) -> bool {
        self.next < self.end
    }

    fn next(&mut self, _elapsed: Duration) -> u32 {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        self.next += 1;
        self.next
    }
}

/// Yields 1.. and panics on item `fail_at`
struct FailingSource {
    next: u32,
    fail_at: u32,
}

impl DataSource<u32> for FailingSource {
    fn has_next(&mut self, _elapsed: Duration) -> bool {
        true
    }

    fn next(&mut self, _elapsed: Duration) -> u32 {
        self.next += 1;
        if self.next == self.fail_at {
            panic!("source failed on item {}", self.next);
        }
        self.next
    }
}

// ============================================================================
// Mock Workers
// ============================================================================

#[derive(Default)]
struct RecordingWorker {
    items: Mutex<Vec<u32>>,
    delay: Option<Duration>,
}

impl RecordingWorker {
    fn with_delay(delay: Duration) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    fn items(&self) -> Vec<u32> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait]
impl Worker<u32> for RecordingWorker {
    async fn accept(&self, item: u32) -> Result<(), WorkerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.items.lock().unwrap().push(item);
        Ok(())
    }
}

/// Fails every item divisible by `divisor`
struct DivisibleFails {
    divisor: u32,
}

#[async_trait]
impl Worker<u32> for DivisibleFails {
    async fn accept(&self, item: u32) -> Result<(), WorkerError> {
        if item % self.divisor == 0 {
            Err(WorkerError::failed(format!("item {item}")))
        } else {
            Ok(())
        }
    }
}

/// Panics on one item, succeeds on the rest
struct PanicsOn(u32);

#[async_trait]
impl Worker<u32> for PanicsOn {
    async fn accept(&self, item: u32) -> Result<(), WorkerError> {
        if item == self.0 {
            panic!("worker panicked on {item}");
        }
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn inline_builder(rate: f64) -> LoadGeneratorBuilder<u32> {
    LoadGeneratorBuilder::new().rate(rate).inline().metrics(false)
}

/// Run an unbounded source for `duration` of virtual time and return the
/// number of dispatched items
async fn dispatched_within(rate: RateConfig, duration: Duration) -> u64 {
    let generator = Arc::new(
        LoadGeneratorBuilder::new()
            .rate_config(rate)
            .inline()
            .metrics(false)
            .data_source(SequenceSource::unbounded())
            .worker(RecordingWorker::default())
            .build()
            .unwrap(),
    );

    let handle = {
        let generator = Arc::clone(&generator);
        tokio::spawn(async move { generator.run().await })
    };
    tokio::time::sleep(duration).await;
    generator.terminate();

    let summary = handle.await.unwrap().unwrap();
    assert!(!summary.exhausted);
    summary.dispatched
}

// ============================================================================
// Builder Tests
// ============================================================================

#[tokio::test]
async fn test_builder_missing_data_source() {
    let result = inline_builder(10.0)
        .worker(RecordingWorker::default())
        .build();
    assert!(matches!(
        result,
        Err(LoadGenError::MissingConfig("data_source"))
    ));
}

#[tokio::test]
async fn test_builder_missing_worker() {
    let result = inline_builder(10.0)
        .data_source(SequenceSource::new(1))
        .build();
    assert!(matches!(result, Err(LoadGenError::MissingConfig("worker"))));
}

#[tokio::test]
async fn test_builder_invalid_config() {
    let result = inline_builder(-1.0)
        .data_source(SequenceSource::new(1))
        .worker(RecordingWorker::default())
        .build();
    assert!(matches!(result, Err(LoadGenError::Config(_))));
}

#[tokio::test]
async fn test_builder_reject_without_handler() {
    let result = LoadGeneratorBuilder::new()
        .pool(
            PoolConfig::default()
                .with_threads(1)
                .with_backpressure(Backpressure::Reject),
        )
        .data_source(SequenceSource::new(1))
        .worker(RecordingWorker::default())
        .build();
    assert!(matches!(
        result,
        Err(LoadGenError::MissingConfig("rejection_handler"))
    ));
}

#[tokio::test]
async fn test_builder_from_config() {
    let config = LoadGeneratorConfig::new(400.0)
        .with_buffer(BufferConfig::default())
        .with_metrics(false);
    let generator = LoadGeneratorBuilder::new()
        .config(config)
        .data_source(SequenceSource::new(10))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    assert_eq!(generator.state(), GeneratorState::Created);
    assert_eq!(generator.collector().unwrap().capacity(), 480);
    assert!(generator.worker_pool().is_some());
    assert_eq!(generator.config().rate, RateConfig::Constant(400.0));

    let debug = format!("{:?}", generator);
    assert!(debug.contains("LoadGenerator"));
    assert!(debug.contains("buffered: true"));

    generator.shutdown().await.unwrap();
}

// ============================================================================
// Dispatch Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_end_to_end_self_terminates_in_order() {
    let worker = Arc::new(RecordingWorker::default());
    let generator = inline_builder(100.0)
        .data_source(SequenceSource::new(500))
        .worker(Arc::clone(&worker))
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();

    assert!(summary.exhausted);
    assert_eq!(summary.dispatched, 500);
    assert_eq!(summary.failed, 0);
    assert_eq!(worker.items(), (1..=500).collect::<Vec<_>>());
    assert_eq!(generator.state(), GeneratorState::Terminated);

    // 500 items at 100/s take five seconds of virtual time
    assert!(summary.elapsed >= Duration::from_millis(4_950));
    assert!(summary.elapsed <= Duration::from_millis(5_050));
    assert!((summary.achieved_rate() - 100.0).abs() < 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_error_does_not_grow() {
    for seconds in [1u64, 10, 60] {
        let dispatched =
            dispatched_within(RateConfig::Constant(250.0), Duration::from_secs(seconds)).await;
        let expected = 250 * seconds;
        assert!(
            dispatched.abs_diff(expected) <= 3,
            "after {seconds}s dispatched {dispatched}, expected {expected}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_fractional_rate_has_no_drift() {
    let dispatched = dispatched_within(RateConfig::Constant(33.3), Duration::from_secs(30)).await;
    assert!(dispatched.abs_diff(999) <= 2);
}

#[tokio::test(start_paused = true)]
async fn test_two_step_rate() {
    let rate = RateConfig::Steps(vec![
        RateStep::new(Duration::from_secs(2), 50.0),
        RateStep::new(Duration::from_secs(2), 150.0),
    ]);
    let dispatched = dispatched_within(rate, Duration::from_secs(4)).await;
    assert!(dispatched.abs_diff(400) <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_rate_period_builds_no_backlog() {
    let rate = RateConfig::Steps(vec![
        RateStep::new(Duration::from_secs(1), 100.0),
        RateStep::new(Duration::from_secs(1), 0.0),
        RateStep::new(Duration::from_secs(1), 300.0),
    ]);
    let dispatched = dispatched_within(rate, Duration::from_secs(3)).await;
    assert!(dispatched.abs_diff(400) <= 3);
}

#[tokio::test(start_paused = true)]
async fn test_custom_rate_generator() {
    let generator = inline_builder(1.0)
        .rate_generator(|_elapsed: Duration| 50.0)
        .data_source(SequenceSource::new(100))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();
    assert_eq!(summary.dispatched, 100);
    assert!(summary.elapsed >= Duration::from_millis(1_950));
    assert!(summary.elapsed <= Duration::from_millis(2_050));
}

#[tokio::test(start_paused = true)]
async fn test_inline_failures_are_counted_not_fatal() {
    let generator = inline_builder(1_000.0)
        .data_source(SequenceSource::new(30))
        .worker(DivisibleFails { divisor: 3 })
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();
    assert!(summary.exhausted);
    assert_eq!(summary.dispatched, 30);
    assert_eq!(summary.failed, 10);
    assert!((summary.success_rate() - 2.0 / 3.0).abs() < 0.001);
}

#[tokio::test(start_paused = true)]
async fn test_inline_panic_is_counted_not_fatal() {
    let generator = inline_builder(100.0)
        .data_source(SequenceSource::new(10))
        .worker(PanicsOn(3))
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();
    assert!(summary.exhausted);
    assert_eq!(summary.dispatched, 10);
    assert_eq!(summary.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pulse_counter_tracks_dispatches() {
    let generator = inline_builder(200.0)
        .data_source(SequenceSource::new(40))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();
    let pulses = generator.pulse_counter();

    generator.run().await.unwrap();
    assert_eq!(pulses.get_and_reset(), 40);
    assert_eq!(pulses.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_with_metrics_reporter() {
    let generator = LoadGeneratorBuilder::new()
        .rate(100.0)
        .inline()
        .data_source(SequenceSource::new(250))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();
    assert_eq!(summary.dispatched, 250);
    // The reporter resets the counter every second
    assert!(generator.pulse_counter().get() < 250);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_terminate_is_idempotent_and_blocks_run() {
    let generator = inline_builder(10.0)
        .data_source(SequenceSource::new(10))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    generator.terminate();
    generator.terminate();
    assert!(generator.is_terminated());
    assert_eq!(generator.state(), GeneratorState::Terminated);

    let result = generator.run().await;
    assert!(matches!(result, Err(LoadGenError::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn test_second_run_fails() {
    let generator = inline_builder(1_000.0)
        .data_source(SequenceSource::new(5))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    generator.run().await.unwrap();
    let result = generator.run().await;
    assert!(matches!(result, Err(LoadGenError::InvalidState(_))));
}

#[tokio::test(start_paused = true)]
async fn test_run_while_running_fails() {
    let generator = Arc::new(
        inline_builder(10.0)
            .data_source(SequenceSource::unbounded())
            .worker(RecordingWorker::default())
            .build()
            .unwrap(),
    );

    let handle = {
        let generator = Arc::clone(&generator);
        tokio::spawn(async move { generator.run().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(generator.state(), GeneratorState::Running);

    let result = generator.run().await;
    assert!(matches!(result, Err(LoadGenError::InvalidState(_))));

    generator.terminate();
    let summary = handle.await.unwrap().unwrap();
    assert!(!summary.exhausted);
    assert_eq!(generator.state(), GeneratorState::Terminated);
}

// ============================================================================
// Collector and Pool Tests
// ============================================================================

#[tokio::test]
async fn test_buffered_pool_preserves_fifo() {
    let worker = Arc::new(RecordingWorker::default());
    let generator = LoadGeneratorBuilder::new()
        .rate(2_000.0)
        .metrics(false)
        .buffer(BufferConfig::default().with_capacity(64))
        .pool(PoolConfig::default().with_threads(1).with_queue_capacity(16))
        .data_source(SequenceSource::new(300))
        .worker(Arc::clone(&worker))
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();
    assert!(summary.exhausted);
    assert_eq!(summary.dispatched, 300);

    let stats = generator.shutdown().await.unwrap().unwrap();
    assert_eq!(stats.completed, 300);
    assert_eq!(worker.items(), (1..=300).collect::<Vec<_>>());
    assert!(generator.collector().unwrap().is_exhausted());
}

#[tokio::test]
async fn test_slow_source_underruns_without_losing_items() {
    let worker = Arc::new(RecordingWorker::default());
    let generator = inline_builder(1_000.0)
        .buffer(BufferConfig::default().with_capacity(4))
        .data_source(SequenceSource::new(40).with_latency(Duration::from_millis(5)))
        .worker(Arc::clone(&worker))
        .build()
        .unwrap();

    let summary = generator.run().await.unwrap();
    generator.shutdown().await.unwrap();

    assert!(summary.exhausted);
    assert!(summary.underruns > 0);
    assert_eq!(summary.dispatched, 40);
    assert_eq!(worker.items(), (1..=40).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_pool_reject_policy_hands_overflow_to_handler() {
    let rejected = Arc::new(AtomicUsize::new(0));
    let generator = {
        let rejected = Arc::clone(&rejected);
        LoadGeneratorBuilder::new()
            .rate(1_000.0)
            .metrics(false)
            .pool(
                PoolConfig::default()
                    .with_threads(1)
                    .with_queue_capacity(1)
                    .with_backpressure(Backpressure::Reject),
            )
            .rejection_handler(move |_item: u32| {
                rejected.fetch_add(1, Ordering::SeqCst);
            })
            .data_source(SequenceSource::new(50))
            .worker(RecordingWorker::with_delay(Duration::from_millis(10)))
            .build()
            .unwrap()
    };

    let summary = generator.run().await.unwrap();
    let stats = generator.shutdown().await.unwrap().unwrap();

    assert_eq!(summary.dispatched, 50);
    assert!(stats.rejected > 0);
    assert_eq!(stats.rejected, rejected.load(Ordering::SeqCst));
    assert_eq!(stats.completed + stats.rejected, 50);
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let generator = LoadGeneratorBuilder::new()
        .rate(500.0)
        .metrics(false)
        .buffer(BufferConfig::default())
        .pool(PoolConfig::default().with_threads(2))
        .data_source(SequenceSource::new(20))
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    generator.run().await.unwrap();
    let first = generator.shutdown().await.unwrap().unwrap();
    let second = generator.shutdown().await.unwrap().unwrap();

    assert_eq!(first.completed, 20);
    assert_eq!(second.completed, 20);
    assert!(generator.worker_pool().unwrap().is_shutdown());
}

#[tokio::test]
async fn test_source_panic_while_priming_fails_run() {
    let generator = inline_builder(1_000.0)
        .buffer(BufferConfig::default().with_capacity(100))
        .data_source(FailingSource { next: 0, fail_at: 5 })
        .worker(RecordingWorker::default())
        .build()
        .unwrap();

    let result = generator.run().await;
    assert!(matches!(result, Err(LoadGenError::Collector(_))));
    assert_eq!(generator.state(), GeneratorState::Terminated);
}

#[tokio::test]
async fn test_source_panic_mid_run_is_not_exhaustion() {
    let worker = Arc::new(RecordingWorker::default());
    let generator = inline_builder(1_000.0)
        .buffer(BufferConfig::default().with_capacity(8))
        .data_source(FailingSource { next: 0, fail_at: 50 })
        .worker(Arc::clone(&worker))
        .build()
        .unwrap();

    let result = generator.run().await;
    assert!(matches!(result, Err(LoadGenError::Collector(_))));
    // Everything pulled before the failure was still dispatched
    assert_eq!(worker.items(), (1..50).collect::<Vec<_>>());
    assert!(!generator.collector().unwrap().is_exhausted());
    generator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_collector_stopped_mid_run_fails_run() {
    let generator = Arc::new(
        inline_builder(100.0)
            .buffer(BufferConfig::default().with_capacity(16))
            .data_source(SequenceSource::unbounded())
            .worker(RecordingWorker::default())
            .build()
            .unwrap(),
    );

    let handle = {
        let generator = Arc::clone(&generator);
        tokio::spawn(async move { generator.run().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(generator.state(), GeneratorState::Running);
    generator.collector().unwrap().stop().await.unwrap();

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(LoadGenError::Collector(_))));
}

#[tokio::test]
async fn test_shutdown_mid_run_ends_cleanly() {
    let generator = Arc::new(
        inline_builder(100.0)
            .buffer(BufferConfig::default().with_capacity(16))
            .data_source(SequenceSource::unbounded())
            .worker(RecordingWorker::default())
            .build()
            .unwrap(),
    );

    let handle = {
        let generator = Arc::clone(&generator);
        tokio::spawn(async move { generator.run().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    generator.shutdown().await.unwrap();

    let summary = handle.await.unwrap().unwrap();
    assert!(!summary.exhausted);
}
