//! Core traits for data sources, workers and rate generators
//!
//! Implementations of the data side live in `loadgen-sources`; the engine
//! only ever sees these contracts.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Data Source Trait
// ============================================================================

/// Source of items fed to the load generator
///
/// Called from a single task at a time (either the dispatcher or the
/// data collector), so implementations may keep plain mutable state.
/// `elapsed` is the time since the consumer started pulling.
pub trait DataSource<T>: Send {
    /// Whether another item can be produced
    ///
    /// Returning `false` is terminal: the engine never pulls from this
    /// source again.
    fn has_next(&mut self, elapsed: Duration) -> bool;

    /// Produce the next item
    ///
    /// Only called after `has_next` returned `true`.
    fn next(&mut self, elapsed: Duration) -> T;
}

impl<T, S> DataSource<T> for Box<S>
where
    S: DataSource<T> + ?Sized,
{
    fn has_next(&mut self, elapsed: Duration) -> bool {
        (**self).has_next(elapsed)
    }

    fn next(&mut self, elapsed: Duration) -> T {
        (**self).next(elapsed)
    }
}

// ============================================================================
// Worker Trait
// ============================================================================

/// Work performed for every dispatched item
///
/// Failures are reported through [`WorkerError`]; the engine logs and counts
/// them but never stops dispatching because of one.
#[async_trait]
pub trait Worker<T>: Send + Sync {
    /// Process one item
    async fn accept(&self, item: T) -> Result<(), WorkerError>;
}

#[async_trait]
impl<T, W> Worker<T> for Arc<W>
where
    T: Send + 'static,
    W: Worker<T> + ?Sized,
{
    async fn accept(&self, item: T) -> Result<(), WorkerError> {
        (**self).accept(item).await
    }
}

/// Per-item worker failures
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The work itself failed
    #[error("work failed: {0}")]
    Failed(String),

    /// The worker pool no longer accepts items
    #[error("worker pool is shut down")]
    Closed,

    /// Any other error raised by the work function
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl WorkerError {
    /// Create a failure with a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// ============================================================================
// Rate Generator Trait
// ============================================================================

/// Maps time since the start of a run to a target rate in items per second
///
/// Implementations must be pure: the dispatcher calls `rate` once per
/// iteration. Zero, negative and non-finite values all mean "dispatch
/// nothing right now".
pub trait RateGenerator: Send + Sync {
    /// Target rate at `elapsed` since the run started
    fn rate(&self, elapsed: Duration) -> f64;
}

impl<F> RateGenerator for F
where
    F: Fn(Duration) -> f64 + Send + Sync,
{
    fn rate(&self, elapsed: Duration) -> f64 {
        self(elapsed)
    }
}
