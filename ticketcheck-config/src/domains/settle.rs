//! Settling-wait configuration
//!
//! Asynchronous backends acknowledge reservations before applying them, so
//! the final snapshot has to wait for the consumer to drain. The default is
//! a fixed delay per strategy; polling until the snapshot stops changing is
//! available when a fixed delay proves flaky.

use super::target::StrategyId;
use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to wait between the end of load and the final snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettleMode {
    /// Fixed delay chosen by the strategy under test
    #[default]
    StrategyDefault,
    /// No delay
    None,
    /// Fixed delay of `wait`
    Fixed,
    /// Re-read until `stable_reads` identical snapshots or `max_wait`
    PollUntilStable,
}

/// Settling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    #[serde(default)]
    pub mode: SettleMode,

    /// Delay used by `fixed` mode
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub wait: Option<Duration>,

    /// Interval between reads in `poll-until-stable` mode
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Upper bound on `poll-until-stable`
    #[serde(with = "humantime_serde", default = "default_max_wait")]
    pub max_wait: Duration,

    /// Consecutive identical snapshots that count as settled
    #[serde(default = "default_stable_reads")]
    pub stable_reads: u32,
}

impl SettleConfig {
    /// Fixed delay each strategy waits for by default
    pub fn strategy_default_wait(strategy: StrategyId) -> Duration {
        match strategy {
            StrategyId::DistributedLock => Duration::from_secs(2),
            StrategyId::QueuedAsync => Duration::from_secs(20),
            _ => Duration::ZERO,
        }
    }

    /// Fixed delay for `strategy` under `fixed` or `strategy-default` modes
    pub fn fixed_wait_for(&self, strategy: StrategyId) -> Duration {
        match self.mode {
            SettleMode::None => Duration::ZERO,
            SettleMode::Fixed => self
                .wait
                .unwrap_or_else(|| Self::strategy_default_wait(strategy)),
            SettleMode::StrategyDefault | SettleMode::PollUntilStable => {
                Self::strategy_default_wait(strategy)
            }
        }
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            mode: SettleMode::default(),
            wait: None,
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
            stable_reads: default_stable_reads(),
        }
    }
}

impl Validatable for SettleConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.mode == SettleMode::PollUntilStable {
            validate_positive(self.stable_reads, "stable_reads", self.domain_name())?;
            if self.poll_interval.is_zero() {
                return Err(self.validation_error("poll_interval must be greater than 0"));
            }
            if self.max_wait < self.poll_interval {
                return Err(self.validation_error("max_wait must be at least poll_interval"));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "settle"
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(60)
}

fn default_stable_reads() -> u32 {
    3
}
