//! Drift-free conversion of elapsed time into due items

use std::time::Duration;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Tracks how much of the run's elapsed time has been paid for with items
///
/// The consumed point is kept in fractional nanoseconds from the start of
/// the run and only ever advances by the exact time worth of the items that
/// were dispatched, so rounding never accumulates across iterations.
#[derive(Debug, Clone)]
pub(crate) struct RateAccumulator {
    consumed: f64,
    min_tick: f64,
}

impl RateAccumulator {
    pub(crate) fn new(min_tick: Duration) -> Self {
        Self {
            consumed: 0.0,
            min_tick: min_tick.as_nanos() as f64,
        }
    }

    /// Whole items owed at `from_start` for the current `rate`
    ///
    /// Zero while less than the minimum tick has passed since the consumed
    /// point. A rate that is not positive owes nothing and moves the
    /// consumed point up to `from_start`, so pauses build no backlog.
    pub(crate) fn due(&mut self, from_start: Duration, rate: f64) -> u64 {
        let now = from_start.as_nanos() as f64;
        if !is_active(rate) {
            self.consumed = self.consumed.max(now);
            return 0;
        }

        let elapsed = now - self.consumed;
        if elapsed < self.min_tick {
            return 0;
        }
        (elapsed * rate / NANOS_PER_SEC).floor() as u64
    }

    /// Pay for `count` dispatched items at `rate`
    pub(crate) fn consume(&mut self, count: u64, rate: f64) {
        if count > 0 && is_active(rate) {
            self.consumed += count as f64 * NANOS_PER_SEC / rate;
        }
    }

    #[cfg(test)]
    fn consumed(&self) -> Duration {
        Duration::from_nanos(self.consumed as u64)
    }
}

fn is_active(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}
