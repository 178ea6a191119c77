//! Builder pattern for AsyncWorker construction

use crate::config::{Backpressure, PoolConfig};
use crate::error::{LoadGenError, Result};
use crate::traits::Worker;

use super::executor::{AsyncWorker, RejectionHandler};

use std::sync::Arc;

/// Builder for creating AsyncWorker instances
///
/// # Example
/// ```ignore
/// let pool = AsyncWorkerBuilder::new()
///     .worker(worker)
///     .threads(8)
///     .queue_capacity(1_000)
///     .backpressure(Backpressure::Reject)
///     .rejection_handler(|item| tracing::warn!(?item, "dropped"))
///     .build()?;
/// ```
pub struct AsyncWorkerBuilder<T> {
    worker: Option<Arc<dyn Worker<T>>>,
    config: PoolConfig,
    on_reject: Option<RejectionHandler<T>>,
}

impl<T: Send + 'static> AsyncWorkerBuilder<T> {
    /// Create a builder with the default pool configuration
    pub fn new() -> Self {
        Self {
            worker: None,
            config: PoolConfig::default(),
            on_reject: None,
        }
    }

    /// Set the work executed for every item
    pub fn worker(mut self, worker: impl Worker<T> + 'static) -> Self {
        self.worker = Some(Arc::new(worker));
        self
    }

    /// Set the full pool configuration
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of pool tasks
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Set the queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the full queue policy
    pub fn backpressure(mut self, backpressure: Backpressure) -> Self {
        self.config.backpressure = backpressure;
        self
    }

    /// Set the callback receiving items refused by a full queue
    pub fn rejection_handler(mut self, handler: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_reject = Some(Arc::new(handler));
        self
    }

    pub(crate) fn shared_rejection_handler(mut self, handler: Option<RejectionHandler<T>>) -> Self {
        self.on_reject = handler;
        self
    }

    pub(crate) fn shared_worker(mut self, worker: Arc<dyn Worker<T>>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Build the pool and spawn its tasks
    ///
    /// # Errors
    /// Returns an error if the worker is missing, the configuration is
    /// invalid, or no Tokio runtime is running.
    pub fn build(self) -> Result<AsyncWorker<T>> {
        let worker = self.worker.ok_or(LoadGenError::missing_config("worker"))?;
        AsyncWorker::new(worker, &self.config, self.on_reject)
    }
}

impl<T: Send + 'static> Default for AsyncWorkerBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
