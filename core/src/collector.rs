//! Background buffering between a data source and the dispatcher
//!
//! The collector pulls from a possibly slow [`DataSource`] on the blocking
//! thread pool and keeps a bounded FIFO queue filled, so the dispatcher never
//! waits on the source while pacing. It is single-producer (the collection
//! loop) and single-consumer (whoever polls it, normally the dispatcher).

use crate::channel::prime_threshold;
use crate::error::{LoadGenError, Result};
use crate::traits::DataSource;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;

/// Pause of the collection loop while the queue is full
const FULL_QUEUE_BACKOFF: Duration = Duration::from_micros(50);

/// Pause between queue size checks while priming
const PRIME_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of taking the next buffered item
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Feed<T> {
    /// Next item in source order
    Item(T),
    /// Nothing buffered yet, the source is still producing
    Pending,
    /// Source exhausted and the queue is drained
    Exhausted,
    /// Collection loop ended early (stopped or panicked) and the queue is
    /// drained
    Interrupted,
}

#[derive(Debug, Default)]
struct CollectorFlags {
    stop: AtomicBool,
    exhausted: AtomicBool,
    primed: AtomicBool,
}

/// Bounded, primed buffer filled from a [`DataSource`] in the background
///
/// The `elapsed` passed to the source is zero while priming and counts from
/// the end of priming afterwards, which is when dispatch begins. Items are
/// still pulled up to one queue ahead of dispatch.
pub struct DataCollector<T> {
    capacity: usize,
    source: Mutex<Option<Box<dyn DataSource<T>>>>,
    tx: Mutex<Option<mpsc::Sender<T>>>,
    rx: Mutex<mpsc::Receiver<T>>,
    flags: Arc<CollectorFlags>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> DataCollector<T> {
    /// Create a collector over `source` with a queue of `capacity` items
    ///
    /// Nothing is pulled until [`DataCollector::start`].
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a zero capacity.
    pub fn new(source: impl DataSource<T> + 'static, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(LoadGenError::invalid_argument(
                "collector capacity must be at least 1",
            ));
        }

        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            capacity,
            source: Mutex::new(Some(Box::new(source))),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            flags: Arc::new(CollectorFlags::default()),
            handle: Mutex::new(None),
        })
    }

    /// Start collecting and wait until the queue is primed
    ///
    /// Returns once the queue holds 75% of its capacity, or the source is
    /// exhausted, or the collection loop ended. Must be called within a
    /// Tokio runtime.
    ///
    /// # Errors
    /// Returns `InvalidState` if the collector was already started, and
    /// `Collector` if the collection loop panicked while priming.
    pub async fn start(&self) -> Result<()> {
        let source = lock(&self.source).take();
        let tx = lock(&self.tx).take();
        let (mut source, tx) = match (source, tx) {
            (Some(source), Some(tx)) => (source, tx),
            _ => {
                return Err(LoadGenError::invalid_state(
                    "data collector was already started",
                ))
            }
        };

        let flags = Arc::clone(&self.flags);
        let handle = tokio::task::spawn_blocking(move || collect(&mut source, tx, &flags));
        *lock(&self.handle) = Some(handle);

        let threshold = prime_threshold(self.capacity);
        tracing::debug!(
            capacity = self.capacity,
            threshold,
            "Priming data queue from data source"
        );
        while self.queue_size() < threshold && !self.collection_finished() {
            tokio::time::sleep(PRIME_POLL_INTERVAL).await;
        }
        self.flags.primed.store(true, Ordering::Release);

        if !self.flags.exhausted.load(Ordering::Acquire) && self.loop_finished() {
            let handle = lock(&self.handle).take();
            if let Some(handle) = handle {
                handle.await.map_err(|e| {
                    tracing::error!(error = %e, "Data collector failed while priming");
                    LoadGenError::Collector(e.to_string())
                })?;
            }
        }
        tracing::debug!(queued = self.queue_size(), "Finished priming data queue");

        Ok(())
    }

    /// Remove the head item, or `None` if nothing is buffered right now
    ///
    /// `None` does not mean the source is exhausted; see
    /// [`DataCollector::is_exhausted`].
    pub fn poll(&self) -> Option<T> {
        lock(&self.rx).try_recv().ok()
    }

    pub(crate) fn take(&self) -> Feed<T> {
        match lock(&self.rx).try_recv() {
            Ok(item) => Feed::Item(item),
            Err(TryRecvError::Empty) => Feed::Pending,
            // Only the collection loop drops its sender, when it exits
            Err(TryRecvError::Disconnected) if self.flags.exhausted.load(Ordering::Acquire) => {
                Feed::Exhausted
            }
            Err(TryRecvError::Disconnected) => Feed::Interrupted,
        }
    }

    /// Why the collection loop ended before the source was exhausted
    pub(crate) async fn interruption(&self) -> LoadGenError {
        let handle = lock(&self.handle).take();
        match handle {
            Some(handle) => match handle.await {
                Err(e) => LoadGenError::Collector(e.to_string()),
                Ok(()) => LoadGenError::Collector(
                    "data collection stopped before the source was exhausted".to_string(),
                ),
            },
            None => LoadGenError::Collector(
                "data collector was stopped before the source was exhausted".to_string(),
            ),
        }
    }

    /// Items currently buffered
    pub fn queue_size(&self) -> usize {
        lock(&self.rx).len()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`DataCollector::start`] has been called
    pub fn is_started(&self) -> bool {
        lock(&self.source).is_none()
    }

    /// Source exhausted and every buffered item consumed
    pub fn is_exhausted(&self) -> bool {
        self.flags.exhausted.load(Ordering::Acquire) && lock(&self.rx).is_empty()
    }

    /// Stop the collection loop and wait for it to exit
    ///
    /// Items still buffered stay available to [`DataCollector::poll`].
    /// Calling it again, or before starting, is a no-op.
    ///
    /// # Errors
    /// Returns `Collector` if the collection loop panicked.
    pub async fn stop(&self) -> Result<()> {
        self.flags.stop.store(true, Ordering::Release);
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| {
                tracing::error!(error = %e, "Data collector task failed");
                LoadGenError::Collector(e.to_string())
            })?;
            tracing::debug!("Data collector stopped");
        }
        Ok(())
    }

    fn collection_finished(&self) -> bool {
        self.flags.exhausted.load(Ordering::Acquire) || self.loop_finished()
    }

    fn loop_finished(&self) -> bool {
        lock(&self.handle)
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }
}

impl<T> std::fmt::Debug for DataCollector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCollector")
            .field("capacity", &self.capacity)
            .field("exhausted", &self.flags.exhausted.load(Ordering::Relaxed))
            .finish()
    }
}

/// Collection loop run on the blocking pool
///
/// A queue slot is reserved before each pull, so every item taken from the
/// source is queued.
fn collect<T>(source: &mut Box<dyn DataSource<T>>, tx: mpsc::Sender<T>, flags: &CollectorFlags) {
    let mut epoch: Option<Instant> = None;

    while !flags.stop.load(Ordering::Acquire) {
        let permit = match tx.try_reserve() {
            Ok(permit) => permit,
            Err(TrySendError::Full(())) => {
                std::thread::sleep(FULL_QUEUE_BACKOFF);
                continue;
            }
            Err(TrySendError::Closed(())) => return,
        };

        let elapsed = if flags.primed.load(Ordering::Acquire) {
            epoch.get_or_insert_with(Instant::now).elapsed()
        } else {
            Duration::ZERO
        };
        if !source.has_next(elapsed) {
            tracing::debug!("Reached end of data source");
            flags.exhausted.store(true, Ordering::Release);
            break;
        }

        permit.send(source.next(elapsed));
    }
}

fn lock<G>(mutex: &Mutex<G>) -> MutexGuard<'_, G> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
