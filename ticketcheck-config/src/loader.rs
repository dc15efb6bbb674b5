//! Configuration loading and environment variable handling

use crate::domains::load::{
    ProfileConfig, STANDARD_CONCURRENCY, STANDARD_TIME_BOUND, STANDARD_TOTAL_ATTEMPTS,
};
use crate::domains::settle::SettleMode;
use crate::domains::utils::parse_env_duration;
use crate::domains::TicketcheckConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "TICKETCHECK".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TicketcheckConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<TicketcheckConfig> {
        let mut config: TicketcheckConfig = serde_yaml::from_str(content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TicketcheckConfig> {
        let mut config = TicketcheckConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TicketcheckConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut TicketcheckConfig) -> ConfigResult<()> {
        self.apply_target_overrides(&mut config.target)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_load_overrides(&mut config.load)?;
        self.apply_settle_overrides(&mut config.settle)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply target service overrides
    fn apply_target_overrides(
        &self,
        config: &mut crate::domains::target::TargetConfig,
    ) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(ticket_id) = self.get_env_var("TICKET_ID") {
            config.ticket_id = ticket_id
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid TICKET_ID: {}", e)))?;
        }

        // Kept raw; unknown identifiers fall back when the run is configured
        if let Ok(strategy) = self.get_env_var("STRATEGY") {
            config.strategy = Some(strategy);
        }

        if let Ok(fallback) = self.get_env_var("FALLBACK_STRATEGY") {
            config.fallback_strategy = fallback.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid FALLBACK_STRATEGY: {}", e))
            })?;
        }

        if let Ok(marker) = self.get_env_var("LOCK_TIMEOUT_MARKER") {
            config.lock_timeout_marker = marker;
        }

        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_TIMEOUT: {}", e)))?;
            config.timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        Ok(())
    }

    /// Apply load profile overrides.
    ///
    /// Any constant-profile variable switches the run to a constant profile,
    /// starting from the standard one for unset fields.
    fn apply_load_overrides(
        &self,
        config: &mut crate::domains::load::LoadConfig,
    ) -> ConfigResult<()> {
        let concurrency = self.get_env_var("CONCURRENCY").ok();
        let total_attempts = self.get_env_var("TOTAL_ATTEMPTS").ok();
        let time_bound = self.get_env_var("TIME_BOUND").ok();

        if concurrency.is_none() && total_attempts.is_none() && time_bound.is_none() {
            return Ok(());
        }

        let (mut c, mut a, mut t) = match config.profile {
            Some(ProfileConfig::Constant {
                concurrency,
                total_attempts,
                time_bound,
            }) => (concurrency, total_attempts, time_bound),
            _ => (
                STANDARD_CONCURRENCY,
                STANDARD_TOTAL_ATTEMPTS,
                STANDARD_TIME_BOUND,
            ),
        };

        if let Some(value) = concurrency {
            c = value
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CONCURRENCY: {}", e)))?;
        }
        if let Some(value) = total_attempts {
            a = value
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid TOTAL_ATTEMPTS: {}", e)))?;
        }
        if let Some(value) = time_bound {
            t = parse_env_duration(&value)
                .map_err(|e| ConfigError::EnvError(format!("Invalid TIME_BOUND: {}", e)))?;
        }

        config.profile = Some(ProfileConfig::Constant {
            concurrency: c,
            total_attempts: a,
            time_bound: t,
        });
        Ok(())
    }

    /// Apply settling overrides
    fn apply_settle_overrides(
        &self,
        config: &mut crate::domains::settle::SettleConfig,
    ) -> ConfigResult<()> {
        if let Ok(wait) = self.get_env_var("SETTLE_WAIT") {
            let wait = parse_env_duration(&wait)
                .map_err(|e| ConfigError::EnvError(format!("Invalid SETTLE_WAIT: {}", e)))?;
            config.mode = SettleMode::Fixed;
            config.wait = Some(wait);
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
