//! Outcome of a dispatch run

use std::time::Duration;

/// Counters of a finished [`crate::LoadGenerator::run`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Items handed to the worker sink
    pub dispatched: u64,

    /// Dispatched items the sink reported as failed
    pub failed: u64,

    /// Iterations cut short because the collector had nothing buffered
    pub underruns: u64,

    /// Time from the first iteration to loop exit
    pub elapsed: Duration,

    /// Whether the run ended because the data source ran out
    pub exhausted: bool,
}

impl RunSummary {
    /// Dispatched items per second over the whole run
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.dispatched as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of dispatched items the sink accepted (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.dispatched == 0 {
            0.0
        } else {
            (self.dispatched - self.failed) as f64 / self.dispatched as f64
        }
    }
}
