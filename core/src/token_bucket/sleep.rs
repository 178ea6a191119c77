//! Sleep strategies used between failed blocking acquisitions

use std::time::Duration;

/// Blocks the calling thread between two acquisition attempts
pub trait SleepStrategy: Send + Sync {
    /// Wait before the next attempt
    fn sleep(&self);
}

/// Retries immediately, only hinting the CPU that it is spinning
#[derive(Debug, Clone, Copy, Default)]
pub struct BusySpin;

impl SleepStrategy for BusySpin {
    fn sleep(&self) {
        std::hint::spin_loop();
    }
}

/// Sleeps for a fixed duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSleep {
    duration: Duration,
}

impl FixedSleep {
    /// Sleep for `duration`
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Sleep for `nanos` nanoseconds
    pub fn from_nanos(nanos: u64) -> Self {
        Self::new(Duration::from_nanos(nanos))
    }

    /// Sleep for `micros` microseconds
    pub fn from_micros(micros: u64) -> Self {
        Self::new(Duration::from_micros(micros))
    }

    /// Sleep for `millis` milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Configured pause
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl SleepStrategy for FixedSleep {
    fn sleep(&self) {
        std::thread::sleep(self.duration);
    }
}
