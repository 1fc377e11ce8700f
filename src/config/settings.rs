use serde::Deserialize;
use std::time::Duration;

use crate::resilience::retry::{RetryBackoff, RetryPolicy};
use crate::utils::constants::{
    DEFAULT_EXPIRING_AUTH_TOKEN_REFRESH_PERIOD_MS, DEFAULT_EXPONENTIAL_FACTOR, DEFAULT_MAX_RETRY,
    DEFAULT_METRICS_PATH, DEFAULT_RETRY_INTERVAL_MS,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    /// how long before `exp` the token is refreshed
    pub expiring_auth_token_refresh_period_ms: Option<u64>,
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub server: Option<ServerConfig>,
    pub logging: Option<LoggingConfig>,
}

impl SettingsConfig {
    pub fn expiring_auth_token_refresh_period(&self) -> Duration {
        Duration::from_millis(
            self.expiring_auth_token_refresh_period_ms
                .unwrap_or(DEFAULT_EXPIRING_AUTH_TOKEN_REFRESH_PERIOD_MS),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetryConfig {
    /// failure-triggered requests are dropped after this many attempts
    pub max_retry: Option<u32>,
    pub retry_interval_ms: Option<u64>,
    pub retry_backoff: Option<RetryBackoff>,
    /// only used with `retry_backoff: exponential`
    /// invariant: >= 1.0
    pub exponential_factor: Option<f64>,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retry: self.max_retry.unwrap_or(DEFAULT_MAX_RETRY),
            retry_interval: Duration::from_millis(
                self.retry_interval_ms.unwrap_or(DEFAULT_RETRY_INTERVAL_MS),
            ),
            retry_backoff: self.retry_backoff.unwrap_or_default(),
            exponential_factor: self.exponential_factor.unwrap_or(DEFAULT_EXPONENTIAL_FACTOR),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::Compact)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    DEFAULT_METRICS_PATH.to_string()
}
