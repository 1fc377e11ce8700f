//! Shared constants and defaults

pub const DEFAULT_EXPIRING_AUTH_TOKEN_REFRESH_PERIOD_MS: u64 = 60_000;
pub const DEFAULT_MAX_RETRY: u32 = 10;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 6_000;
pub const DEFAULT_EXPONENTIAL_FACTOR: f64 = 2.0;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const METRICS_PREFIX: &str = "authrefresher";
