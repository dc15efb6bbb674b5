//! HTTP configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ticketcheck_config::HttpConfig as ConfigHttpConfig;

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Request timeout; an attempt exceeding it is a transport error
    pub timeout: Duration,

    /// TCP connect timeout
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,

    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        ConfigHttpConfig::default().into()
    }
}

impl From<ConfigHttpConfig> for HttpClientConfig {
    fn from(config: ConfigHttpConfig) -> Self {
        Self {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            pool_idle_timeout: config.connection_pool.idle_timeout,
            pool_max_idle_per_host: config.connection_pool.max_idle_per_host,
            user_agent: config.user_agent,
        }
    }
}
