//! Rate generators: constant, stepped and ramped throughput profiles

use crate::traits::RateGenerator;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Same rate for the whole run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRate {
    rate: f64,
}

impl ConstantRate {
    /// Create a constant rate in items per second
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl RateGenerator for ConstantRate {
    fn rate(&self, _elapsed: Duration) -> f64 {
        self.rate
    }
}

/// One segment of a [`SteppedRate`] schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateStep {
    /// How long this step lasts
    pub duration: Duration,
    /// Items per second during this step
    pub rate: f64,
}

impl RateStep {
    /// Create a step
    pub fn new(duration: Duration, rate: f64) -> Self {
        Self { duration, rate }
    }
}

/// Piecewise-constant schedule
///
/// Steps run back to back from the start of the run. Once the schedule is
/// over the last step's rate stays in effect; end a schedule with a zero
/// rate step to pause instead.
#[derive(Debug, Clone, PartialEq)]
pub struct SteppedRate {
    steps: Vec<RateStep>,
}

impl SteppedRate {
    /// Create a schedule from its steps
    pub fn new(steps: Vec<RateStep>) -> Self {
        Self { steps }
    }

    /// Steps in order
    pub fn steps(&self) -> &[RateStep] {
        &self.steps
    }
}

impl RateGenerator for SteppedRate {
    fn rate(&self, elapsed: Duration) -> f64 {
        let mut boundary = Duration::ZERO;
        for step in &self.steps {
            boundary = boundary.saturating_add(step.duration);
            if elapsed < boundary {
                return step.rate;
            }
        }
        self.steps.last().map(|step| step.rate).unwrap_or(0.0)
    }
}

/// Linear ramp from one rate to another, holding the final rate afterwards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampRate {
    from: f64,
    to: f64,
    over: Duration,
}

impl RampRate {
    /// Ramp from `from` to `to` items per second over `over`
    pub fn new(from: f64, to: f64, over: Duration) -> Self {
        Self { from, to, over }
    }
}

impl RateGenerator for RampRate {
    fn rate(&self, elapsed: Duration) -> f64 {
        if self.over.is_zero() || elapsed >= self.over {
            return self.to;
        }
        let progress = elapsed.as_secs_f64() / self.over.as_secs_f64();
        self.from + (self.to - self.from) * progress
    }
}

/// Serializable description of a throughput profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateConfig {
    /// Fixed items per second
    Constant(f64),

    /// Back-to-back steps, last rate holds afterwards
    Steps(Vec<RateStep>),

    /// Linear ramp, final rate holds afterwards
    Ramp {
        /// Starting rate
        from: f64,
        /// Final rate
        to: f64,
        /// Ramp duration
        over: Duration,
    },
}

impl Default for RateConfig {
    fn default() -> Self {
        RateConfig::Constant(1000.0)
    }
}

impl RateConfig {
    /// Highest rate this profile ever asks for
    ///
    /// Used to size buffers that must absorb one second of peak traffic.
    pub fn peak_rate(&self) -> f64 {
        match self {
            RateConfig::Constant(rate) => *rate,
            RateConfig::Steps(steps) => steps.iter().map(|s| s.rate).fold(0.0, f64::max),
            RateConfig::Ramp { from, to, .. } => from.max(*to),
        }
    }

    /// Build the matching generator
    pub fn generator(&self) -> Box<dyn RateGenerator> {
        match self {
            RateConfig::Constant(rate) => Box::new(ConstantRate::new(*rate)),
            RateConfig::Steps(steps) => Box::new(SteppedRate::new(steps.clone())),
            RateConfig::Ramp { from, to, over } => Box::new(RampRate::new(*from, *to, *over)),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        fn usable(rate: f64) -> bool {
            rate.is_finite() && rate >= 0.0
        }

        match self {
            RateConfig::Constant(rate) => {
                if !rate.is_finite() || *rate <= 0.0 {
                    return Err(format!("constant rate must be positive, got {rate}"));
                }
            }
            RateConfig::Steps(steps) => {
                if steps.is_empty() {
                    return Err("step schedule must contain at least one step".into());
                }
                if let Some(step) = steps.iter().find(|s| !usable(s.rate)) {
                    return Err(format!("step rate must be non-negative, got {}", step.rate));
                }
                if self.peak_rate() <= 0.0 {
                    return Err("step schedule never dispatches anything".into());
                }
            }
            RateConfig::Ramp { from, to, .. } => {
                if !usable(*from) || !usable(*to) {
                    return Err(format!("ramp rates must be non-negative, got {from} -> {to}"));
                }
                if self.peak_rate() <= 0.0 {
                    return Err("ramp never dispatches anything".into());
                }
            }
        }
        Ok(())
    }
}
