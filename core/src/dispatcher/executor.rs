//! Self-clocking dispatch loop

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use crate::collector::{DataCollector, Feed};
use crate::config::LoadGeneratorConfig;
use crate::error::{LoadGenError, Result};
use crate::metrics::{spawn_reporter, PulseCounter};
use crate::traits::{DataSource, RateGenerator, Worker};
use crate::worker::{AsyncWorker, WorkerStats};

use super::accumulator::RateAccumulator;
use super::summary::RunSummary;

/// Lifecycle of a [`LoadGenerator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Built, `run` not called yet
    Created,
    /// Dispatch loop running
    Running,
    /// Terminated, by request or because the source ran out
    Terminated,
}

/// Where the dispatcher pulls items from
pub(crate) enum Input<T> {
    /// Pulled on the dispatch path
    Direct(Box<dyn DataSource<T>>),
    /// Pulled from a background collector queue
    Buffered(Arc<DataCollector<T>>),
}

impl<T: Send + 'static> Input<T> {
    fn pull(&mut self, elapsed: Duration) -> Feed<T> {
        match self {
            Input::Direct(source) => {
                if source.has_next(elapsed) {
                    Feed::Item(source.next(elapsed))
                } else {
                    Feed::Exhausted
                }
            }
            Input::Buffered(collector) => collector.take(),
        }
    }
}

/// Rate-controlled load generator
///
/// Every iteration asks the rate generator for the current target, works out
/// how many items are owed since the last dispatch and hands that many to the
/// worker sink. Single-shot: once terminated it cannot run again.
pub struct LoadGenerator<T> {
    /// Validated configuration
    pub(crate) config: LoadGeneratorConfig,

    /// Target rate over time
    pub(crate) generator: Box<dyn RateGenerator>,

    /// Item input, taken by `run`
    pub(crate) input: Mutex<Option<Input<T>>>,

    /// Background collector when buffering is configured
    pub(crate) collector: Option<Arc<DataCollector<T>>>,

    /// Where items are handed to
    pub(crate) sink: Arc<dyn Worker<T>>,

    /// Pool behind `sink` when the sink is a pool
    pub(crate) pool: Option<Arc<AsyncWorker<T>>>,

    /// Dispatched items since the last pulse read
    pub(crate) pulses: Arc<PulseCounter>,

    pub(crate) started: AtomicBool,
    pub(crate) terminate: AtomicBool,
}

impl<T: Send + 'static> LoadGenerator<T> {
    /// Request termination
    ///
    /// Idempotent and callable from any task or thread. Does not wait for the
    /// loop to exit; it stops at its next check.
    pub fn terminate(&self) {
        if !self.terminate.swap(true, Ordering::AcqRel) {
            tracing::debug!("Load generator termination requested");
        }
    }

    /// Whether termination was requested or the source ran out
    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    /// Current lifecycle state
    pub fn state(&self) -> GeneratorState {
        if self.is_terminated() {
            GeneratorState::Terminated
        } else if self.started.load(Ordering::Acquire) {
            GeneratorState::Running
        } else {
            GeneratorState::Created
        }
    }

    /// Run the dispatch loop until terminated or the source is exhausted
    ///
    /// Starts the collector first when buffering is configured, and waits for
    /// it to prime. Does not stop the collector or the pool on exit; see
    /// [`LoadGenerator::shutdown`].
    ///
    /// # Errors
    /// Returns `InvalidState` when called after termination or a second time,
    /// and `Collector` when the collector fails or is stopped before the
    /// source is exhausted.
    pub async fn run(&self) -> Result<RunSummary> {
        if self.is_terminated() {
            return Err(LoadGenError::invalid_state(
                "load generator was terminated and cannot run again",
            ));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(LoadGenError::invalid_state("load generator already started"));
        }
        let mut input = lock(&self.input)
            .take()
            .ok_or_else(|| LoadGenError::invalid_state("load generator input already taken"))?;

        if let Some(collector) = &self.collector {
            if !collector.is_started() {
                if let Err(e) = collector.start().await {
                    self.terminate.store(true, Ordering::Release);
                    return Err(e);
                }
            }
        }

        let reporter = self
            .config
            .metrics
            .enabled
            .then(|| spawn_reporter(Arc::clone(&self.pulses), self.config.metrics.interval));

        tracing::info!(
            rate = ?self.config.rate,
            tick_ms = self.config.tick.as_secs_f64() * 1000.0,
            buffered = self.collector.is_some(),
            pooled = self.pool.is_some(),
            "Starting load generator"
        );

        let (summary, failure) = self.dispatch(&mut input).await;

        if let Some(reporter) = reporter {
            reporter.abort();
        }
        self.terminate.store(true, Ordering::Release);

        if let Some(e) = failure {
            tracing::error!(
                dispatched = summary.dispatched,
                failed = summary.failed,
                error = %e,
                "Load generator stopped by a data collector failure"
            );
            return Err(e);
        }

        tracing::info!(
            dispatched = summary.dispatched,
            failed = summary.failed,
            underruns = summary.underruns,
            exhausted = summary.exhausted,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            achieved_rate = summary.achieved_rate(),
            "Load generator finished"
        );

        Ok(summary)
    }

    async fn dispatch(&self, input: &mut Input<T>) -> (RunSummary, Option<LoadGenError>) {
        let tick = self.config.tick;
        let mut accumulator = RateAccumulator::new(tick);
        let mut summary = RunSummary::default();
        let start = Instant::now();

        let mut interrupted = false;

        while !self.is_terminated() {
            let from_start = start.elapsed();
            let rate = self.generator.rate(from_start);
            let due = accumulator.due(from_start, rate);

            if due == 0 {
                tokio::time::sleep(tick).await;
                continue;
            }

            let mut sent = 0;
            while sent < due && !self.is_terminated() {
                let item = match input.pull(from_start) {
                    Feed::Item(item) => item,
                    Feed::Pending => {
                        summary.underruns += 1;
                        tracing::trace!(owed = due - sent, "Data collector underrun");
                        break;
                    }
                    Feed::Exhausted => {
                        tracing::info!(dispatched = summary.dispatched, "Data source exhausted");
                        summary.exhausted = true;
                        self.terminate();
                        break;
                    }
                    Feed::Interrupted => {
                        // A stop that follows terminate is a normal end
                        interrupted = !self.is_terminated();
                        self.terminate();
                        break;
                    }
                };

                match AssertUnwindSafe(self.sink.accept(item)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        summary.failed += 1;
                        tracing::warn!(error = %e, "Worker failed to process item");
                    }
                    Err(_) => {
                        summary.failed += 1;
                        tracing::warn!("Worker panicked while processing item");
                    }
                }
                sent += 1;
                self.pulses.increment();
            }

            accumulator.consume(sent, rate);
            summary.dispatched += sent;

            if sent == 0 {
                tokio::time::sleep(tick).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        summary.elapsed = start.elapsed();

        if !interrupted {
            return (summary, None);
        }
        let failure = match &self.collector {
            Some(collector) => collector.interruption().await,
            None => LoadGenError::Collector("data collection ended early".to_string()),
        };
        (summary, Some(failure))
    }

    /// Terminate, stop the collector and drain the worker pool, in that order
    ///
    /// Only touches what the builder created. Returns the pool stats when the
    /// sink is a pool. Safe to call more than once.
    ///
    /// # Errors
    /// Propagates collector and pool shutdown failures.
    pub async fn shutdown(&self) -> Result<Option<WorkerStats>> {
        self.terminate();

        if let Some(collector) = &self.collector {
            collector.stop().await?;
        }

        match &self.pool {
            Some(pool) => pool.shutdown().await.map(Some),
            None => Ok(None),
        }
    }

    /// Counter of dispatched items, reset by whoever reads it
    pub fn pulse_counter(&self) -> Arc<PulseCounter> {
        Arc::clone(&self.pulses)
    }

    /// Background collector, when buffering is configured
    pub fn collector(&self) -> Option<&Arc<DataCollector<T>>> {
        self.collector.as_ref()
    }

    /// Worker pool, when the sink is a pool
    pub fn worker_pool(&self) -> Option<&Arc<AsyncWorker<T>>> {
        self.pool.as_ref()
    }

    /// Configuration the generator was built with
    pub fn config(&self) -> &LoadGeneratorConfig {
        &self.config
    }
}

impl<T> std::fmt::Debug for LoadGenerator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadGenerator")
            .field("config", &self.config)
            .field("buffered", &self.collector.is_some())
            .field("pooled", &self.pool.is_some())
            .field("terminated", &self.terminate.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
