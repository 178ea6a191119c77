//! Refill strategies deciding how many tokens a bucket gains per operation

use std::time::{Duration, Instant};

/// Produces the number of tokens to add to a bucket
///
/// Called once per bucket operation while the bucket lock is held, so
/// implementations never see concurrent calls.
pub trait RefillStrategy: Send {
    /// Tokens to add now
    fn refill(&mut self) -> u64;
}

impl<F> RefillStrategy for F
where
    F: FnMut() -> u64 + Send,
{
    fn refill(&mut self) -> u64 {
        self()
    }
}

/// Adds `tokens` for every whole `period` elapsed since the last refill
///
/// The period boundary advances by whole periods only, so partial periods
/// carry over and the long-run refill rate is exact.
#[derive(Debug, Clone)]
pub struct FixedIntervalRefill {
    tokens: u64,
    period: Duration,
    last: Instant,
}

impl FixedIntervalRefill {
    /// Add `tokens` every `period`, starting now
    ///
    /// A zero period is treated as one nanosecond.
    pub fn new(tokens: u64, period: Duration) -> Self {
        Self {
            tokens,
            period: period.max(Duration::from_nanos(1)),
            last: Instant::now(),
        }
    }

    /// Add `rate` tokens once per second
    pub fn per_second(rate: u64) -> Self {
        Self::new(rate, Duration::from_secs(1))
    }
}

impl RefillStrategy for FixedIntervalRefill {
    fn refill(&mut self) -> u64 {
        let elapsed = self.last.elapsed();
        let periods = elapsed.as_nanos() / self.period.as_nanos();
        if periods == 0 {
            return 0;
        }
        let periods = u32::try_from(periods).unwrap_or(u32::MAX);
        self.last += self.period * periods;
        self.tokens.saturating_mul(u64::from(periods))
    }
}

/// Adds `tokens` on every `every`-th call, regardless of time
#[derive(Debug, Clone)]
pub struct EveryNCallsRefill {
    tokens: u64,
    every: u64,
    calls: u64,
}

impl EveryNCallsRefill {
    /// Add `tokens` once every `every` calls (zero behaves like one)
    pub fn new(tokens: u64, every: u64) -> Self {
        Self {
            tokens,
            every: every.max(1),
            calls: 0,
        }
    }
}

impl RefillStrategy for EveryNCallsRefill {
    fn refill(&mut self) -> u64 {
        self.calls += 1;
        if self.calls >= self.every {
            self.calls = 0;
            self.tokens
        } else {
            0
        }
    }
}
