//! loadgen-core: Rate-controlled load generation engine
//!
//! This crate drives a stream of items into a worker at a target rate that
//! may change over time, including:
//!
//! - Rate profiles (constant, stepped, ramped) and the `RateGenerator` trait
//! - A self-clocking, drift-free dispatcher (`LoadGenerator`)
//! - A token bucket with pluggable refill and sleep strategies
//! - Background buffering of slow data sources (`DataCollector`)
//! - Inline or pooled worker sinks with backpressure
//! - Pulse counting and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod rate;
pub mod token_bucket;
pub mod traits;
pub mod worker;

pub use channel::BufferConfig;
pub use collector::DataCollector;
pub use config::*;
pub use dispatcher::{GeneratorState, LoadGenerator, LoadGeneratorBuilder, RunSummary};
pub use error::*;
pub use metrics::{MetricsConfig, PulseCounter};
pub use rate::*;
pub use token_bucket::TokenBucket;
pub use traits::*;
pub use worker::{AsyncWorker, AsyncWorkerBuilder, ThrottledWorker, WorkerStats};
