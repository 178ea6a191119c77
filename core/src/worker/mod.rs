//! Worker sinks executing dispatched items
//!
//! The dispatcher hands every item to a [`crate::Worker`]. With an inline
//! sink that is the user's worker, awaited on the dispatch path. With a pool
//! sink it is an [`AsyncWorker`]: a bounded queue drained by a fixed number
//! of Tokio tasks, applying a [`crate::Backpressure`] policy when full.
//!
//! # Example
//!
//! ```ignore
//! use loadgen_core::worker::AsyncWorkerBuilder;
//!
//! let pool = AsyncWorkerBuilder::new()
//!     .worker(worker)
//!     .threads(4)
//!     .queue_capacity(100)
//!     .build()?;
//!
//! pool.accept(item).await?;
//! let stats = pool.shutdown().await?;
//! println!("Completed: {}", stats.completed);
//! ```

mod builder;
mod executor;
mod rate_limiter;
mod stats;

pub use builder::AsyncWorkerBuilder;
pub use executor::{AsyncWorker, RejectionHandler};
pub use rate_limiter::ThrottledWorker;
pub use stats::WorkerStats;
