//! Queue sizing for the data collector buffer

use serde::{Deserialize, Serialize};

/// Fraction of the collector queue filled before dispatching starts
pub const PRIME_RATIO: f64 = 0.75;

/// Data collector buffer configuration
///
/// The buffer absorbs one second of peak traffic scaled by `burst_factor`
/// unless an explicit `capacity` is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Fixed queue capacity, overriding the rate-based size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Multiplier applied to the peak rate when sizing the queue
    pub burst_factor: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            burst_factor: 1.2,
        }
    }
}

impl BufferConfig {
    /// Use a fixed queue capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the burst factor used for rate-based sizing
    pub fn with_burst_factor(mut self, factor: f64) -> Self {
        self.burst_factor = factor;
        self
    }

    /// Queue capacity for a profile peaking at `peak_rate` items per second
    pub fn capacity_for(&self, peak_rate: f64) -> usize {
        match self.capacity {
            Some(capacity) => capacity.max(1),
            None => ((peak_rate * self.burst_factor).ceil() as usize).max(1),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.capacity == Some(0) {
            return Err("buffer capacity must be at least 1".into());
        }
        if !self.burst_factor.is_finite() || self.burst_factor <= 0.0 {
            return Err(format!(
                "burst factor must be positive, got {}",
                self.burst_factor
            ));
        }
        Ok(())
    }
}

/// Number of queued items a collector waits for before it reports ready
pub fn prime_threshold(capacity: usize) -> usize {
    ((capacity as f64 * PRIME_RATIO).ceil() as usize).clamp(1, capacity.max(1))
}
