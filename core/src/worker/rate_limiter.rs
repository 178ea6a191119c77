//! Token bucket throttling for item execution

use crate::token_bucket::TokenBucket;
use crate::traits::{Worker, WorkerError};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default pause between two failed token acquisitions
const DEFAULT_PAUSE: Duration = Duration::from_millis(1);

/// Worker decorator taking one token per item before delegating
///
/// Waits asynchronously between attempts instead of blocking the task the
/// way [`TokenBucket::acquire`] would. Share one bucket between several
/// decorators to throttle them together.
pub struct ThrottledWorker<W> {
    inner: W,
    bucket: Arc<TokenBucket>,
    pause: Duration,
}

impl<W> ThrottledWorker<W> {
    /// Throttle `inner` with `bucket`
    pub fn new(inner: W, bucket: Arc<TokenBucket>) -> Self {
        Self {
            inner,
            bucket,
            pause: DEFAULT_PAUSE,
        }
    }

    /// Set the pause between failed acquisitions
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Bucket the tokens are taken from
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }

    async fn wait_for_token(&self) -> Result<(), WorkerError> {
        loop {
            match self.bucket.try_acquire(1) {
                Ok(true) => return Ok(()),
                Ok(false) => tokio::time::sleep(self.pause).await,
                Err(e) => return Err(WorkerError::failed(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl<T, W> Worker<T> for ThrottledWorker<W>
where
    T: Send + 'static,
    W: Worker<T>,
{
    async fn accept(&self, item: T) -> Result<(), WorkerError> {
        self.wait_for_token().await?;
        self.inner.accept(item).await
    }
}

impl<W> std::fmt::Debug for ThrottledWorker<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledWorker")
            .field("bucket", &self.bucket)
            .field("pause", &self.pause)
            .finish()
    }
}
