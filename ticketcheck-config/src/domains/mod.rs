//! Domain-specific configuration modules

pub mod http;
pub mod load;
pub mod logging;
pub mod settle;
pub mod target;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main ticketcheck configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TicketcheckConfig {
    /// Reservation service under test
    #[serde(default)]
    pub target: target::TargetConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Load generation configuration
    #[serde(default)]
    pub load: load::LoadConfig,

    /// Settling wait before the final snapshot
    #[serde(default)]
    pub settle: settle::SettleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl TicketcheckConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.http.validate()?;
        self.load.validate()?;
        self.settle.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Names accepted by [`TicketcheckConfig::scenario`]
    pub fn scenario_names() -> Vec<&'static str> {
        target::StrategyId::ALL.iter().map(|s| s.as_str()).collect()
    }

    /// Built-in configuration exercising one strategy, with its profile,
    /// thresholds and settling wait spelled out.
    pub fn scenario(name: &str) -> ConfigResult<Self> {
        let strategy: target::StrategyId = name.parse().map_err(|_| {
            ConfigError::UnknownScenario(name.to_string(), Self::scenario_names().join(", "))
        })?;

        let mut config = Self::default();
        config.target.strategy = Some(strategy.as_str().to_string());
        config.load.profile = Some(load::ProfileConfig::for_strategy(strategy));
        config.load.thresholds = load::ThresholdsConfig::for_strategy(strategy);
        config.settle.mode = settle::SettleMode::Fixed;
        config.settle.wait = Some(settle::SettleConfig::strategy_default_wait(strategy));
        Ok(config)
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = TicketcheckConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
