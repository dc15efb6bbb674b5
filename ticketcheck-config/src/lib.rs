//! Domain-driven configuration management for ticketcheck
//!
//! Configuration is split by functional domain (target service, HTTP client,
//! load profile, settling policy, logging), each with validation, defaults
//! and `TICKETCHECK_*` environment variable overrides.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    http::HttpConfig,
    load::{LoadConfig, ProfileConfig, StageConfig, ThresholdsConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    settle::{SettleConfig, SettleMode},
    target::{ResolvedStrategy, StrategyId, TargetConfig, DEFAULT_LOCK_TIMEOUT_MARKER},
    TicketcheckConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
