//! Dispatch counters and periodic reporting

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Counts events since it was last read
///
/// `get_and_reset` is a single atomic swap, so no increment is ever lost
/// or counted twice between two reads.
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: AtomicU64,
}

impl PulseCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `n` events
    pub fn add(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Current count without resetting
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Return the count since the previous reset and reset it to zero
    pub fn get_and_reset(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

/// Periodic pulse reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the reporter task runs
    pub enabled: bool,

    /// How often the pulse count is logged and reset
    pub interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(1),
        }
    }
}

/// Spawn a task logging and resetting `counter` every `interval`
///
/// The task runs until aborted. Must be called within a Tokio runtime.
pub fn spawn_reporter(counter: Arc<PulseCounter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let pulses = counter.get_and_reset();
            let per_second = pulses as f64 / interval.as_secs_f64();
            tracing::info!(pulses, per_second, "Dispatched items");
        }
    })
}
