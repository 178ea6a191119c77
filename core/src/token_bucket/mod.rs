//! Token bucket rate limiter
//!
//! A bounded pool of credits refilled by a pluggable [`RefillStrategy`] and
//! consumed by acquisitions. Blocking acquisition waits between attempts with
//! a pluggable [`SleepStrategy`]. The bucket is independent of the dispatcher
//! and can be shared across threads through an `Arc`.
//!
//! # Example
//!
//! ```
//! use loadgen_core::token_bucket::{BusySpin, EveryNCallsRefill, TokenBucket};
//!
//! let bucket = TokenBucket::new(10, 10, EveryNCallsRefill::new(0, 1), BusySpin).unwrap();
//! assert!(bucket.try_acquire(4).unwrap());
//! assert_eq!(bucket.available(), 6);
//! assert!(!bucket.try_acquire(7).unwrap());
//! ```

mod refill;
mod sleep;

pub use refill::{EveryNCallsRefill, FixedIntervalRefill, RefillStrategy};
pub use sleep::{BusySpin, FixedSleep, SleepStrategy};

use crate::error::{LoadGenError, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct BucketState {
    size: u64,
    refill: Box<dyn RefillStrategy>,
}

/// Token bucket with pluggable refill and sleep strategies
pub struct TokenBucket {
    capacity: u64,
    state: Mutex<BucketState>,
    sleep: Box<dyn SleepStrategy>,
}

impl TokenBucket {
    /// Create a bucket holding `initial_tokens` out of `capacity`
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `capacity` is zero or `initial_tokens`
    /// exceeds it.
    pub fn new(
        capacity: u64,
        initial_tokens: u64,
        refill: impl RefillStrategy + 'static,
        sleep: impl SleepStrategy + 'static,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(LoadGenError::invalid_argument("capacity must be positive"));
        }
        if initial_tokens > capacity {
            return Err(LoadGenError::invalid_argument(format!(
                "initial tokens ({initial_tokens}) must not exceed capacity ({capacity})"
            )));
        }

        Ok(Self {
            capacity,
            state: Mutex::new(BucketState {
                size: initial_tokens,
                refill: Box::new(refill),
            }),
            sleep: Box::new(sleep),
        })
    }

    /// Try to take `tokens` without blocking
    ///
    /// Refills first, then takes the tokens if enough are available. On
    /// `Ok(false)` the bucket content is left as refilled.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for zero tokens or more tokens than the
    /// bucket can ever hold.
    pub fn try_acquire(&self, tokens: u64) -> Result<bool> {
        self.check_request(tokens)?;
        Ok(self.take(tokens))
    }

    /// Take `tokens`, sleeping between attempts until they are available
    ///
    /// Blocks the calling thread and has no timeout; wrap it in an external
    /// deadline when bounded waits are needed.
    ///
    /// # Errors
    /// Same argument checks as [`TokenBucket::try_acquire`], performed once
    /// before waiting.
    pub fn acquire(&self, tokens: u64) -> Result<()> {
        self.check_request(tokens)?;
        while !self.take(tokens) {
            self.sleep.sleep();
        }
        Ok(())
    }

    /// Tokens currently in the bucket, without refilling
    pub fn available(&self) -> u64 {
        self.lock().size
    }

    /// Maximum number of tokens
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn check_request(&self, tokens: u64) -> Result<()> {
        if tokens == 0 {
            return Err(LoadGenError::invalid_argument(
                "number of tokens to acquire must be positive",
            ));
        }
        if tokens > self.capacity {
            return Err(LoadGenError::invalid_argument(format!(
                "cannot acquire {tokens} tokens from a bucket of capacity {}",
                self.capacity
            )));
        }
        Ok(())
    }

    fn take(&self, tokens: u64) -> bool {
        let mut state = self.lock();
        let added = state.refill.refill();
        state.size = state.size.saturating_add(added).min(self.capacity);

        if tokens <= state.size {
            state.size -= tokens;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        // A refill strategy panicking mid-call leaves `size` valid
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
