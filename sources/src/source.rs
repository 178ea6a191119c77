//! Data source implementations

use loadgen_core::DataSource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::iter::Peekable;
use std::ops::Range;
use std::time::Duration;

/// Feeds the items of any iterator, in order
pub struct IterSource<I: Iterator> {
    iter: Peekable<I>,
}

impl<I: Iterator> IterSource<I> {
    /// Wrap anything that can be iterated
    pub fn new(items: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: items.into_iter().peekable(),
        }
    }
}

impl<I> DataSource<I::Item> for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    fn has_next(&mut self, _elapsed: Duration) -> bool {
        self.iter.peek().is_some()
    }

    /// # Panics
    /// Panics when called after `has_next` returned `false`.
    fn next(&mut self, _elapsed: Duration) -> I::Item {
        match self.iter.next() {
            Some(item) => item,
            None => panic!("IterSource::next called on an exhausted iterator"),
        }
    }
}

impl<I: Iterator> std::fmt::Debug for IterSource<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterSource").finish_non_exhaustive()
    }
}

/// Uniformly distributed integers, endless unless limited
#[derive(Debug)]
pub struct RandomIntSource {
    rng: StdRng,
    range: Range<i64>,
    remaining: Option<u64>,
}

impl RandomIntSource {
    /// Integers drawn from `range`, seeded from the OS
    ///
    /// An empty range always yields its start.
    pub fn new(range: Range<i64>) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            range,
            remaining: None,
        }
    }

    /// Use a fixed seed for reproducible sequences
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Stop after `count` items
    pub fn with_limit(mut self, count: u64) -> Self {
        self.remaining = Some(count);
        self
    }
}

impl DataSource<i64> for RandomIntSource {
    fn has_next(&mut self, _elapsed: Duration) -> bool {
        self.remaining != Some(0)
    }

    fn next(&mut self, _elapsed: Duration) -> i64 {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        if self.range.is_empty() {
            self.range.start
        } else {
            self.rng.gen_range(self.range.clone())
        }
    }
}

/// Ends another source once the run has lasted `limit`
///
/// Behind a buffer the limit still counts from dispatch start, but items
/// are read up to one queue ahead, so the last of them are dispatched
/// shortly after `limit`.
#[derive(Debug)]
pub struct TimeBoundSource<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeBoundSource<S> {
    /// Stop pulling from `inner` after `limit`
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

impl<T, S: DataSource<T>> DataSource<T> for TimeBoundSource<S> {
    fn has_next(&mut self, elapsed: Duration) -> bool {
        elapsed < self.limit && self.inner.has_next(elapsed)
    }

    fn next(&mut self, elapsed: Duration) -> T {
        self.inner.next(elapsed)
    }
}
