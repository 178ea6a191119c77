//! Worker implementations

use async_trait::async_trait;
use loadgen_core::{Worker, WorkerError};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Accepts and discards every item
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpWorker;

#[async_trait]
impl<T: Send + 'static> Worker<T> for NoOpWorker {
    async fn accept(&self, _item: T) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Records every accepted item in arrival order
#[derive(Debug)]
pub struct CollectingWorker<T> {
    items: Mutex<Vec<T>>,
}

impl<T> CollectingWorker<T> {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Number of items received so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was received yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return everything received so far
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> CollectingWorker<T> {
    /// Copy of everything received so far
    pub fn items(&self) -> Vec<T> {
        self.lock().clone()
    }
}

impl<T> Default for CollectingWorker<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> Worker<T> for CollectingWorker<T> {
    async fn accept(&self, item: T) -> Result<(), WorkerError> {
        self.lock().push(item);
        Ok(())
    }
}
