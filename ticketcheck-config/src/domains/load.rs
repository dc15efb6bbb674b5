//! Load profile configuration

use super::target::StrategyId;
use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_ratio, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workers in the standard constant profile
pub const STANDARD_CONCURRENCY: usize = 100;
/// Attempt budget of the standard constant profile
pub const STANDARD_TOTAL_ATTEMPTS: u64 = 1000;
/// Time bound of the standard constant profile
pub const STANDARD_TIME_BOUND: Duration = Duration::from_secs(30);

/// Load generation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Demand shape. When absent the strategy's built-in profile is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileConfig>,

    /// Pass/fail thresholds evaluated at the end of the run. When absent
    /// the strategy's built-in thresholds (if any) apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdsConfig>,
}

/// Demand shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProfileConfig {
    /// Fixed worker pool sharing an attempt budget within a time bound
    Constant {
        concurrency: usize,
        total_attempts: u64,
        #[serde(with = "humantime_serde")]
        time_bound: Duration,
    },
    /// Sequence of `(duration, target concurrency)` steps
    Staged { steps: Vec<StageConfig> },
}

/// One step of a staged ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: usize,
}

/// End-of-run thresholds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    /// Maximum acceptable 95th percentile attempt latency
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_p95_latency: Option<Duration>,

    /// Maximum acceptable fraction of attempts that were not accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_error_rate: Option<f64>,
}

impl ProfileConfig {
    /// 100 workers racing for 1000 attempts, bounded at 30 seconds
    pub fn standard_constant() -> Self {
        ProfileConfig::Constant {
            concurrency: STANDARD_CONCURRENCY,
            total_attempts: STANDARD_TOTAL_ATTEMPTS,
            time_bound: STANDARD_TIME_BOUND,
        }
    }

    /// Ramp to 500, then 2000, hold, then drain to zero over one minute
    pub fn standard_staged() -> Self {
        ProfileConfig::Staged {
            steps: vec![
                StageConfig { duration: Duration::from_secs(10), target: 500 },
                StageConfig { duration: Duration::from_secs(20), target: 2000 },
                StageConfig { duration: Duration::from_secs(20), target: 2000 },
                StageConfig { duration: Duration::from_secs(10), target: 0 },
            ],
        }
    }

    /// Built-in profile for a strategy
    pub fn for_strategy(strategy: StrategyId) -> Self {
        match strategy {
            StrategyId::QueuedAsync => Self::standard_staged(),
            _ => Self::standard_constant(),
        }
    }

    /// Wall-clock span the profile is expected to occupy
    pub fn nominal_duration(&self) -> Duration {
        match self {
            ProfileConfig::Constant { time_bound, .. } => *time_bound,
            ProfileConfig::Staged { steps } => steps.iter().map(|s| s.duration).sum(),
        }
    }
}

impl ThresholdsConfig {
    /// p95 under five seconds and fewer than 10% failed attempts
    pub fn standard() -> Self {
        Self {
            max_p95_latency: Some(Duration::from_secs(5)),
            max_error_rate: Some(0.1),
        }
    }

    /// Built-in thresholds for a strategy
    pub fn for_strategy(strategy: StrategyId) -> Option<Self> {
        match strategy {
            StrategyId::QueuedAsync => Some(Self::standard()),
            _ => None,
        }
    }

    /// True when no threshold is set
    pub fn is_empty(&self) -> bool {
        self.max_p95_latency.is_none() && self.max_error_rate.is_none()
    }
}

impl LoadConfig {
    /// Profile to run for `strategy`
    pub fn profile_for(&self, strategy: StrategyId) -> ProfileConfig {
        self.profile
            .clone()
            .unwrap_or_else(|| ProfileConfig::for_strategy(strategy))
    }

    /// Thresholds to apply for `strategy`
    pub fn thresholds_for(&self, strategy: StrategyId) -> Option<ThresholdsConfig> {
        self.thresholds
            .or_else(|| ThresholdsConfig::for_strategy(strategy))
            .filter(|t| !t.is_empty())
    }
}

impl Validatable for LoadConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ref profile) = self.profile {
            profile.validate()?;
        }
        if let Some(ref thresholds) = self.thresholds {
            thresholds.validate()?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load"
    }
}

impl Validatable for ProfileConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            ProfileConfig::Constant {
                concurrency,
                total_attempts,
                time_bound,
            } => {
                validate_positive(*concurrency, "concurrency", self.domain_name())?;
                validate_positive(*total_attempts, "total_attempts", self.domain_name())?;
                if time_bound.is_zero() {
                    return Err(self.validation_error("time_bound must be greater than 0"));
                }
                Ok(())
            }
            ProfileConfig::Staged { steps } => {
                if steps.is_empty() {
                    return Err(self.validation_error("staged profile needs at least one step"));
                }
                if steps.iter().any(|s| s.duration.is_zero()) {
                    return Err(self.validation_error("every step needs a non-zero duration"));
                }
                if steps.iter().all(|s| s.target == 0) {
                    return Err(
                        self.validation_error("at least one step must have a non-zero target")
                    );
                }
                Ok(())
            }
        }
    }

    fn domain_name(&self) -> &'static str {
        "load.profile"
    }
}

impl Validatable for ThresholdsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(rate) = self.max_error_rate {
            validate_ratio(rate, "max_error_rate", self.domain_name())?;
        }
        if let Some(latency) = self.max_p95_latency {
            if latency.is_zero() {
                return Err(self.validation_error("max_p95_latency must be greater than 0"));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load.thresholds"
    }
}
