//! Load generator configuration types

use crate::channel::BufferConfig;
use crate::metrics::MetricsConfig;
use crate::rate::RateConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of the worker pool queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Worker pool tasks per available CPU
pub const DEFAULT_THREAD_COUNT_COEFFICIENT: usize = 2;

/// What happens when an item arrives at a full worker pool queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Wait for space; the dispatcher slows down with the pool
    #[default]
    Block,

    /// Hand the item to the rejection handler and move on
    Reject,
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of execution tasks draining the queue
    pub threads: usize,

    /// Capacity of the pending item queue
    pub queue_capacity: usize,

    /// Full queue policy
    #[serde(default)]
    pub backpressure: Backpressure,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: Backpressure::Block,
        }
    }
}

impl PoolConfig {
    /// Set the number of execution tasks
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the full queue policy
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }
}

/// Available parallelism times [`DEFAULT_THREAD_COUNT_COEFFICIENT`]
pub fn default_threads() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus * DEFAULT_THREAD_COUNT_COEFFICIENT
}

/// Where dispatched items are executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkConfig {
    /// The dispatcher awaits the worker for every item
    Inline,

    /// Items are queued to a pool of execution tasks
    Pool(PoolConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Pool(PoolConfig::default())
    }
}

/// Load generator configuration
///
/// Defines the throughput profile, how items are buffered on the way in and
/// how they are executed on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadGeneratorConfig {
    /// Throughput profile
    pub rate: RateConfig,

    /// Minimum time between two dispatch decisions
    pub tick: Duration,

    /// Execution sink
    pub sink: SinkConfig,

    /// Background buffering of the data source; `None` pulls directly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer: Option<BufferConfig>,

    /// Pulse reporting
    pub metrics: MetricsConfig,
}

impl Default for LoadGeneratorConfig {
    fn default() -> Self {
        Self {
            rate: RateConfig::default(),
            tick: Duration::from_millis(1),
            sink: SinkConfig::default(),
            buffer: None,
            metrics: MetricsConfig::default(),
        }
    }
}

impl LoadGeneratorConfig {
    /// Create a config with a constant target rate
    pub fn new(rate: f64) -> Self {
        Self {
            rate: RateConfig::Constant(rate),
            ..Default::default()
        }
    }

    /// Set the throughput profile
    pub fn with_rate(mut self, rate: RateConfig) -> Self {
        self.rate = rate;
        self
    }

    /// Set the minimum tick
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the execution sink
    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sink = sink;
        self
    }

    /// Buffer the data source through a collector
    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Enable or disable pulse reporting
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics.enabled = enabled;
        self
    }

    /// Capacity the collector queue gets for this profile, if buffering
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.buffer
            .as_ref()
            .map(|buffer| buffer.capacity_for(self.rate.peak_rate()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate.validate().map_err(ConfigError::InvalidRate)?;

        if self.tick.is_zero() {
            return Err(ConfigError::InvalidTick("tick must be positive".into()));
        }

        if let SinkConfig::Pool(pool) = &self.sink {
            if pool.threads == 0 {
                return Err(ConfigError::InvalidPool(
                    "pool needs at least one thread".into(),
                ));
            }
            if pool.queue_capacity == 0 {
                return Err(ConfigError::InvalidPool(
                    "queue capacity must be at least 1".into(),
                ));
            }
        }

        if let Some(buffer) = &self.buffer {
            buffer.validate().map_err(ConfigError::InvalidBuffer)?;
        }

        if self.metrics.enabled && self.metrics.interval.is_zero() {
            return Err(ConfigError::InvalidMetrics(
                "metrics interval must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid throughput profile
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Invalid tick
    #[error("Invalid tick: {0}")]
    InvalidTick(String),

    /// Invalid worker pool settings
    #[error("Invalid worker pool: {0}")]
    InvalidPool(String),

    /// Invalid buffer settings
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Invalid metrics settings
    #[error("Invalid metrics: {0}")]
    InvalidMetrics(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RateStep;

    #[test]
    fn test_default_config() {
        let config = LoadGeneratorConfig::default();
        assert_eq!(config.rate, RateConfig::Constant(1000.0));
        assert_eq!(config.tick, Duration::from_millis(1));
        assert!(config.buffer.is_none());
        assert!(config.metrics.enabled);

        match config.sink {
            SinkConfig::Pool(pool) => {
                assert_eq!(pool.queue_capacity, 10_000);
                assert_eq!(pool.threads, default_threads());
                assert_eq!(pool.backpressure, Backpressure::Block);
            }
            SinkConfig::Inline => panic!("Expected pool sink by default"),
        }
    }

    #[test]
    fn test_default_threads_scale_with_cpus() {
        assert!(default_threads() >= DEFAULT_THREAD_COUNT_COEFFICIENT);
        assert_eq!(default_threads() % DEFAULT_THREAD_COUNT_COEFFICIENT, 0);
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = LoadGeneratorConfig::new(250.0)
            .with_tick(Duration::from_millis(5))
            .with_sink(SinkConfig::Inline)
            .with_buffer(BufferConfig::default())
            .with_metrics(false);

        assert_eq!(config.rate, RateConfig::Constant(250.0));
        assert_eq!(config.tick, Duration::from_millis(5));
        assert_eq!(config.sink, SinkConfig::Inline);
        assert_eq!(config.buffer_capacity(), Some(300));
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_rate() {
        let config = LoadGeneratorConfig::new(0.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRate(_))));
    }

    #[test]
    fn test_config_validation_negative_rate() {
        let config = LoadGeneratorConfig::new(-10.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_tick() {
        let config = LoadGeneratorConfig::new(10.0).with_tick(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTick(_))));
    }

    #[test]
    fn test_config_validation_empty_pool() {
        let config = LoadGeneratorConfig::new(10.0)
            .with_sink(SinkConfig::Pool(PoolConfig::default().with_threads(0)));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPool(_))));

        let config = LoadGeneratorConfig::new(10.0)
            .with_sink(SinkConfig::Pool(PoolConfig::default().with_queue_capacity(0)));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPool(_))));
    }

    #[test]
    fn test_config_validation_bad_buffer() {
        let config = LoadGeneratorConfig::new(10.0)
            .with_buffer(BufferConfig::default().with_burst_factor(-1.0));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn test_buffer_capacity_uses_peak_rate() {
        let config = LoadGeneratorConfig::default()
            .with_rate(RateConfig::Steps(vec![
                RateStep::new(Duration::from_secs(1), 100.0),
                RateStep::new(Duration::from_secs(1), 500.0),
            ]))
            .with_buffer(BufferConfig::default());
        assert_eq!(config.buffer_capacity(), Some(600));
    }

    #[test]
    fn test_config_serialization() {
        let config = LoadGeneratorConfig::new(42.0).with_sink(SinkConfig::Pool(
            PoolConfig::default()
                .with_threads(3)
                .with_backpressure(Backpressure::Reject),
        ));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"reject\""));
        assert!(!json.contains("buffer"));

        let deserialized: LoadGeneratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }
}
