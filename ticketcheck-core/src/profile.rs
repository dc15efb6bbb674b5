//! Load profiles and end-of-run thresholds

use crate::error::{HarnessError, Result};
use crate::tally::{LatencyStats, OutcomeTally};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ticketcheck_config::{ProfileConfig, StageConfig, ThresholdsConfig};

/// Demand shape of a run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoadProfile {
    /// `concurrency` workers share a budget of `total_attempts`, stopping
    /// early when `time_bound` elapses. No fairness across workers.
    Constant {
        concurrency: usize,
        total_attempts: u64,
        #[serde(with = "humantime_serde")]
        time_bound: Duration,
    },
    /// Concurrency follows the target of each step in turn
    Staged { steps: Vec<Stage> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: usize,
}

impl LoadProfile {
    /// Reject profiles the scheduler cannot run
    pub fn validate(&self) -> Result<()> {
        match self {
            LoadProfile::Constant {
                concurrency,
                total_attempts,
                time_bound,
            } => {
                if *concurrency == 0 || *total_attempts == 0 || time_bound.is_zero() {
                    return Err(HarnessError::InvalidProfile(
                        "constant profile needs non-zero concurrency, attempts and time bound"
                            .to_string(),
                    ));
                }
            }
            LoadProfile::Staged { steps } => {
                if steps.iter().all(|s| s.target == 0) {
                    return Err(HarnessError::InvalidProfile(
                        "staged profile never runs a worker".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Wall-clock span the profile occupies at most, ignoring in-flight attempts
    pub fn nominal_duration(&self) -> Duration {
        match self {
            LoadProfile::Constant { time_bound, .. } => *time_bound,
            LoadProfile::Staged { steps } => steps.iter().map(|s| s.duration).sum(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LoadProfile::Constant { .. } => "constant",
            LoadProfile::Staged { .. } => "staged",
        }
    }
}

impl From<ProfileConfig> for LoadProfile {
    fn from(config: ProfileConfig) -> Self {
        match config {
            ProfileConfig::Constant {
                concurrency,
                total_attempts,
                time_bound,
            } => LoadProfile::Constant {
                concurrency,
                total_attempts,
                time_bound,
            },
            ProfileConfig::Staged { steps } => LoadProfile::Staged {
                steps: steps.into_iter().map(Stage::from).collect(),
            },
        }
    }
}

impl From<StageConfig> for Stage {
    fn from(config: StageConfig) -> Self {
        Self {
            duration: config.duration,
            target: config.target,
        }
    }
}

/// Pass/fail limits evaluated once after load. They never stop a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    #[serde(with = "humantime_serde")]
    pub max_p95_latency: Option<Duration>,
    pub max_error_rate: Option<f64>,
}

impl From<ThresholdsConfig> for Thresholds {
    fn from(config: ThresholdsConfig) -> Self {
        Self {
            max_p95_latency: config.max_p95_latency,
            max_error_rate: config.max_error_rate,
        }
    }
}

/// Threshold evaluation attached to the run report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub max_p95_latency_ms: Option<f64>,
    pub observed_p95_latency_ms: f64,
    /// `None` when no latency limit was set
    pub p95_passed: Option<bool>,
    pub max_error_rate: Option<f64>,
    pub observed_error_rate: f64,
    pub error_rate_passed: Option<bool>,
    pub passed: bool,
}

impl Thresholds {
    /// Both limits are strict: an observation equal to the limit fails
    pub fn evaluate(&self, tally: &OutcomeTally, latency: &LatencyStats) -> ThresholdReport {
        let observed_error_rate = tally.error_rate();

        let p95_passed = self
            .max_p95_latency
            .map(|max| latency.p95_ms < max.as_secs_f64() * 1000.0);
        let error_rate_passed = self.max_error_rate.map(|max| observed_error_rate < max);

        ThresholdReport {
            max_p95_latency_ms: self.max_p95_latency.map(|d| d.as_secs_f64() * 1000.0),
            observed_p95_latency_ms: latency.p95_ms,
            p95_passed,
            max_error_rate: self.max_error_rate,
            observed_error_rate,
            error_rate_passed,
            passed: p95_passed.unwrap_or(true) && error_rate_passed.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latency(p95_ms: f64) -> LatencyStats {
        LatencyStats {
            count: 10,
            p95_ms,
            ..LatencyStats::default()
        }
    }

    #[test]
    fn test_from_config() {
        let profile = LoadProfile::from(ProfileConfig::standard_staged());
        match &profile {
            LoadProfile::Staged { steps } => {
                assert_eq!(steps.len(), 4);
                assert_eq!(steps[1].target, 2000);
            }
            other => panic!("unexpected profile {other:?}"),
        }
        assert_eq!(profile.nominal_duration(), Duration::from_secs(60));
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let idle = LoadProfile::Constant {
            concurrency: 0,
            total_attempts: 10,
            time_bound: Duration::from_secs(1),
        };
        assert!(matches!(
            idle.validate(),
            Err(HarnessError::InvalidProfile(_))
        ));

        let empty = LoadProfile::Staged { steps: vec![] };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_thresholds_pass_and_fail() {
        let thresholds = Thresholds::from(ThresholdsConfig::standard());
        let tally = OutcomeTally {
            accepted: 95,
            business_rejected: 5,
            ..OutcomeTally::default()
        };

        let report = thresholds.evaluate(&tally, &latency(1200.0));
        assert_eq!(report.p95_passed, Some(true));
        assert_eq!(report.error_rate_passed, Some(true));
        assert!(report.passed);

        let report = thresholds.evaluate(&tally, &latency(5000.0));
        assert_eq!(report.p95_passed, Some(false));
        assert!(!report.passed);

        let failing = OutcomeTally {
            accepted: 10,
            business_rejected: 90,
            ..OutcomeTally::default()
        };
        let report = thresholds.evaluate(&failing, &latency(10.0));
        assert_eq!(report.error_rate_passed, Some(false));
        assert!((report.observed_error_rate - 0.9).abs() < 1e-9);
        assert!(!report.passed);
    }

    #[test]
    fn test_unset_limits_pass() {
        let thresholds = Thresholds {
            max_p95_latency: None,
            max_error_rate: Some(0.5),
        };
        let report = thresholds.evaluate(&OutcomeTally::default(), &latency(99999.0));
        assert_eq!(report.p95_passed, None);
        assert!(report.passed);
    }
}
