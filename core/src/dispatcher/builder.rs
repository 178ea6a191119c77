//! Builder pattern for LoadGenerator construction

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::channel::BufferConfig;
use crate::collector::DataCollector;
use crate::config::{LoadGeneratorConfig, PoolConfig, SinkConfig};
use crate::error::{LoadGenError, Result};
use crate::metrics::PulseCounter;
use crate::rate::RateConfig;
use crate::traits::{DataSource, RateGenerator, Worker};
use crate::worker::{AsyncWorkerBuilder, RejectionHandler};

use super::executor::{Input, LoadGenerator};

/// Builder for creating a LoadGenerator with proper configuration
///
/// # Example
///
/// ```ignore
/// let generator = LoadGeneratorBuilder::new()
///     .rate(500.0)
///     .pool(PoolConfig::default().with_threads(8))
///     .buffer(BufferConfig::default())
///     .data_source(source)
///     .worker(worker)
///     .build()?;
///
/// let summary = generator.run().await?;
/// generator.shutdown().await?;
/// ```
pub struct LoadGeneratorBuilder<T> {
    config: LoadGeneratorConfig,
    generator: Option<Box<dyn RateGenerator>>,
    source: Option<Box<dyn DataSource<T>>>,
    worker: Option<Arc<dyn Worker<T>>>,
    on_reject: Option<RejectionHandler<T>>,
}

impl<T: Send + 'static> LoadGeneratorBuilder<T> {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LoadGeneratorConfig::default(),
            generator: None,
            source: None,
            worker: None,
            on_reject: None,
        }
    }

    /// Set the full configuration
    pub fn config(mut self, config: LoadGeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a constant target rate in items per second
    pub fn rate(mut self, rate: f64) -> Self {
        self.config.rate = RateConfig::Constant(rate);
        self
    }

    /// Set the throughput profile
    pub fn rate_config(mut self, rate: RateConfig) -> Self {
        self.config.rate = rate;
        self
    }

    /// Drive the loop with a custom rate generator instead of the configured
    /// profile
    ///
    /// The configured profile still sizes the collector buffer; give the
    /// buffer an explicit capacity when the two differ.
    pub fn rate_generator(mut self, generator: impl RateGenerator + 'static) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// Set the minimum tick
    pub fn tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// Await the worker on the dispatch path
    pub fn inline(mut self) -> Self {
        self.config.sink = SinkConfig::Inline;
        self
    }

    /// Execute items on a worker pool
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.config.sink = SinkConfig::Pool(pool);
        self
    }

    /// Buffer the data source through a background collector
    pub fn buffer(mut self, buffer: BufferConfig) -> Self {
        self.config.buffer = Some(buffer);
        self
    }

    /// Enable or disable pulse reporting
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.config.metrics.enabled = enabled;
        self
    }

    /// Set the data source
    pub fn data_source(mut self, source: impl DataSource<T> + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Set the work executed for every item
    pub fn worker(mut self, worker: impl Worker<T> + 'static) -> Self {
        self.worker = Some(Arc::new(worker));
        self
    }

    /// Set the callback receiving items a full pool queue refuses
    pub fn rejection_handler(mut self, handler: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_reject = Some(Arc::new(handler));
        self
    }

    /// Build the LoadGenerator
    ///
    /// Pool sinks spawn their tasks here, so this must run inside a Tokio
    /// runtime when the sink is a pool.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the data source
    /// or worker is missing.
    pub fn build(self) -> Result<LoadGenerator<T>> {
        self.config
            .validate()
            .map_err(|e| LoadGenError::config(e.to_string()))?;

        let source = self
            .source
            .ok_or(LoadGenError::missing_config("data_source"))?;
        let worker = self.worker.ok_or(LoadGenError::missing_config("worker"))?;
        let custom_generator = self.generator.is_some();
        let generator = self
            .generator
            .unwrap_or_else(|| self.config.rate.generator());

        let (input, collector) = match self.config.buffer_capacity() {
            Some(capacity) => {
                let collector = Arc::new(DataCollector::new(source, capacity)?);
                (Input::Buffered(Arc::clone(&collector)), Some(collector))
            }
            None => (Input::Direct(source), None),
        };

        let (sink, pool) = match &self.config.sink {
            SinkConfig::Inline => {
                if self.on_reject.is_some() {
                    tracing::warn!("Rejection handler ignored for an inline sink");
                }
                (worker, None)
            }
            SinkConfig::Pool(pool_config) => {
                let pool = Arc::new(
                    AsyncWorkerBuilder::new()
                        .shared_worker(worker)
                        .config(pool_config.clone())
                        .shared_rejection_handler(self.on_reject)
                        .build()?,
                );
                (Arc::clone(&pool) as Arc<dyn Worker<T>>, Some(pool))
            }
        };

        tracing::debug!(
            rate = ?self.config.rate,
            custom_generator,
            tick = ?self.config.tick,
            sink = ?self.config.sink,
            buffer_capacity = ?collector.as_ref().map(|c| c.capacity()),
            "Built load generator"
        );

        Ok(LoadGenerator {
            config: self.config,
            generator,
            input: Mutex::new(Some(input)),
            collector,
            sink,
            pool,
            pulses: Arc::new(PulseCounter::new()),
            started: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
        })
    }
}

impl<T: Send + 'static> Default for LoadGeneratorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
