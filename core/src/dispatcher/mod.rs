//! Rate-controlled dispatch of items to a worker sink
//!
//! The [`LoadGenerator`] is a self-clocking loop. Each iteration it:
//! - asks the rate generator for the current target rate
//! - converts the time since the last dispatch into a whole number of due
//!   items, keeping the fractional remainder for later
//! - pulls that many items, from the data source or its collector
//! - hands each one to the worker sink
//!
//! It stops when terminated or when the data source runs out.
//!
//! # Example
//!
//! ```ignore
//! use loadgen_core::{LoadGeneratorBuilder, RateConfig};
//!
//! let generator = LoadGeneratorBuilder::new()
//!     .rate_config(RateConfig::Ramp { from: 10.0, to: 1_000.0, over: Duration::from_secs(30) })
//!     .inline()
//!     .data_source(source)
//!     .worker(worker)
//!     .build()?;
//!
//! let summary = generator.run().await?;
//! println!("Dispatched {} at {:.1}/s", summary.dispatched, summary.achieved_rate());
//! ```

mod accumulator;
mod builder;
mod executor;
mod summary;

pub use builder::LoadGeneratorBuilder;
pub use executor::{GeneratorState, LoadGenerator};
pub use summary::RunSummary;

#[cfg(test)]
mod tests;
