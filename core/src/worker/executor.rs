//! Worker pool execution

use crate::config::{Backpressure, PoolConfig};
use crate::error::{LoadGenError, Result};
use crate::traits::{Worker, WorkerError};

use super::stats::{StatsRecorder, WorkerStats};

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Callback receiving items refused by a full queue
pub type RejectionHandler<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Bounded queue drained by a fixed pool of Tokio tasks
///
/// Implements [`Worker`] itself, so the dispatcher hands items to it the
/// same way it would to an inline worker. Items are dequeued in FIFO order
/// and each one is processed by exactly one pool task.
pub struct AsyncWorker<T> {
    /// Queue sender, `None` once shut down
    tx: Mutex<Option<mpsc::Sender<T>>>,

    /// Full queue policy
    backpressure: Backpressure,

    /// Receives items refused under [`Backpressure::Reject`]
    on_reject: Option<RejectionHandler<T>>,

    /// Pool task handles, drained on shutdown
    handles: Mutex<Vec<JoinHandle<()>>>,

    /// Counters shared with the pool tasks
    stats: Arc<StatsRecorder>,

    threads: usize,
    queue_capacity: usize,
    ended_at: Mutex<Option<Instant>>,
}

impl<T: Send + 'static> AsyncWorker<T> {
    /// Create the pool and spawn its tasks
    ///
    /// Use `AsyncWorkerBuilder` for a more ergonomic construction.
    ///
    /// # Errors
    /// Returns `InvalidState` outside a Tokio runtime, `InvalidArgument`
    /// for an empty pool or queue, and `MissingConfig` when the reject
    /// policy has no handler.
    pub fn new(
        worker: Arc<dyn Worker<T>>,
        config: &PoolConfig,
        on_reject: Option<RejectionHandler<T>>,
    ) -> Result<Self> {
        if config.threads == 0 {
            return Err(LoadGenError::invalid_argument(
                "worker pool needs at least one thread",
            ));
        }
        if config.queue_capacity == 0 {
            return Err(LoadGenError::invalid_argument(
                "worker queue capacity must be at least 1",
            ));
        }
        if config.backpressure == Backpressure::Reject && on_reject.is_none() {
            return Err(LoadGenError::missing_config("rejection_handler"));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            LoadGenError::invalid_state("worker pool must be created inside a Tokio runtime")
        })?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let stats = Arc::new(StatsRecorder::new());

        let handles = (0..config.threads)
            .map(|task_id| {
                runtime.spawn(run_task(
                    task_id,
                    Arc::clone(&rx),
                    Arc::clone(&worker),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        tracing::debug!(
            threads = config.threads,
            queue_capacity = config.queue_capacity,
            backpressure = ?config.backpressure,
            "Worker pool started"
        );

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            backpressure: config.backpressure,
            on_reject,
            handles: Mutex::new(handles),
            stats,
            threads: config.threads,
            queue_capacity: config.queue_capacity,
            ended_at: Mutex::new(None),
        })
    }

    /// Close the queue, let the pool drain it and wait for every task
    ///
    /// Calling it again returns the final stats without waiting.
    ///
    /// # Errors
    /// Returns `WorkerPool` if a pool task was cancelled or failed to join.
    pub async fn shutdown(&self) -> Result<WorkerStats> {
        // Dropping the last sender lets `recv` return `None` once drained
        lock(&self.tx).take();
        let handles: Vec<_> = lock(&self.handles).drain(..).collect();

        if !handles.is_empty() {
            let mut failures = 0;
            for (task_id, result) in futures::future::join_all(handles)
                .await
                .into_iter()
                .enumerate()
            {
                if let Err(e) = result {
                    failures += 1;
                    tracing::error!(task_id, error = %e, "Worker pool task failed");
                }
            }

            let ended_at = Instant::now();
            *lock(&self.ended_at) = Some(ended_at);

            let stats = self.stats.snapshot(Some(ended_at));
            tracing::debug!(
                completed = stats.completed,
                errors = stats.errors,
                rejected = stats.rejected,
                "Worker pool shut down"
            );

            if failures > 0 {
                return Err(LoadGenError::WorkerPool(format!(
                    "{failures} of {} pool tasks failed to join",
                    self.threads
                )));
            }
        }

        Ok(self.stats())
    }

    /// Current counters
    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot(*lock(&self.ended_at))
    }

    /// Items waiting in the queue
    pub fn queue_len(&self) -> usize {
        lock(&self.tx)
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }

    /// Number of pool tasks
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Queue capacity
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Whether [`AsyncWorker::shutdown`] has been called
    pub fn is_shutdown(&self) -> bool {
        lock(&self.tx).is_none()
    }

    fn reject(&self, item: T) {
        self.stats.record_rejected();
        tracing::debug!("Worker queue full, rejecting item");
        if let Some(handler) = &self.on_reject {
            handler(item);
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Worker<T> for AsyncWorker<T> {
    async fn accept(&self, item: T) -> std::result::Result<(), WorkerError> {
        let tx = lock(&self.tx).clone().ok_or(WorkerError::Closed)?;

        match self.backpressure {
            Backpressure::Block => tx.send(item).await.map_err(|_| WorkerError::Closed),
            Backpressure::Reject => match tx.try_send(item) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(item)) => {
                    self.reject(item);
                    Ok(())
                }
                Err(TrySendError::Closed(_)) => Err(WorkerError::Closed),
            },
        }
    }
}

impl<T> std::fmt::Debug for AsyncWorker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncWorker")
            .field("threads", &self.threads)
            .field("queue_capacity", &self.queue_capacity)
            .field("backpressure", &self.backpressure)
            .field("shutdown", &lock(&self.tx).is_none())
            .finish()
    }
}

/// Pool task loop: dequeue -> accept -> record, until the queue closes
async fn run_task<T: Send + 'static>(
    task_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
    worker: Arc<dyn Worker<T>>,
    stats: Arc<StatsRecorder>,
) {
    loop {
        let item = { rx.lock().await.recv().await };
        let Some(item) = item else {
            break;
        };

        match AssertUnwindSafe(worker.accept(item)).catch_unwind().await {
            Ok(Ok(())) => stats.record_success(),
            Ok(Err(e)) => {
                stats.record_error();
                tracing::warn!(task_id, error = %e, "Work failed");
            }
            Err(_) => {
                stats.record_error();
                tracing::warn!(task_id, "Work panicked");
            }
        }
    }

    tracing::trace!(task_id, "Worker pool task finished");
}

fn lock<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
