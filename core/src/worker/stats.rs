//! Worker statistics tracking

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Snapshot of what a worker sink did with its items
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Items processed successfully
    pub completed: usize,

    /// Items whose work failed or panicked
    pub errors: usize,

    /// Items refused because the queue was full
    pub rejected: usize,

    /// Pool start time
    pub started_at: Option<Instant>,

    /// Pool end time
    pub ended_at: Option<Instant>,
}

impl WorkerStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Items that reached the work function (completed + errors)
    pub fn total_processed(&self) -> usize {
        self.completed + self.errors
    }

    /// Success rate among processed items (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_processed() == 0 {
            0.0
        } else {
            self.completed as f64 / self.total_processed() as f64
        }
    }

    /// Error rate among processed items (0.0 - 1.0)
    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Processed items per second
    pub fn items_per_second(&self) -> f64 {
        self.elapsed()
            .map(|d| {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    self.total_processed() as f64 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }
}

/// Counters shared by the execution tasks of a pool
#[derive(Debug)]
pub(crate) struct StatsRecorder {
    completed: AtomicUsize,
    errors: AtomicUsize,
    rejected: AtomicUsize,
    started_at: Instant,
}

impl StatsRecorder {
    pub(crate) fn new() -> Self {
        Self {
            completed: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, ended_at: Option<Instant>) -> WorkerStats {
        WorkerStats {
            completed: self.completed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            started_at: Some(self.started_at),
            ended_at,
        }
    }
}
