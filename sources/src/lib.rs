//! Ready-made data sources and workers
//!
//! This crate provides implementations of the `loadgen-core` traits for:
//!
//! - Iterator-backed and random data sources
//! - Time-bounded runs
//! - No-op and collecting workers for tests and dry runs

#![warn(missing_docs)]
#![warn(clippy::all)]

mod source;
mod worker;

pub use source::{IterSource, RandomIntSource, TimeBoundSource};
pub use worker::{CollectingWorker, NoOpWorker};
