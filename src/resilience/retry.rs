use std::time::Duration;

use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_EXPONENTIAL_FACTOR, DEFAULT_MAX_RETRY, DEFAULT_RETRY_INTERVAL_MS,
};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryBackoff {
    /// Every retry waits `retry_interval`.
    #[default]
    Fixed,
    /// Retry `n` waits `retry_interval * factor^(n-1)`.
    Exponential,
}

/// Backoff policy for failure-triggered token requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Failure-driven requests are dropped once this many attempts have been made.
    pub max_retry: u32,
    pub retry_interval: Duration,
    pub retry_backoff: RetryBackoff,
    pub exponential_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            retry_backoff: RetryBackoff::Fixed,
            exponential_factor: DEFAULT_EXPONENTIAL_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_retry: u32, retry_interval: Duration) -> Self {
        Self {
            max_retry,
            retry_interval,
            retry_backoff: RetryBackoff::Fixed,
            ..Self::default()
        }
    }

    pub fn exponential(max_retry: u32, retry_interval: Duration, exponential_factor: f64) -> Self {
        Self {
            max_retry,
            retry_interval,
            retry_backoff: RetryBackoff::Exponential,
            exponential_factor,
        }
    }

    /// Delay before the next retry, given how many attempts have already been made.
    ///
    /// `retry_count` of 1 (one failed attempt) yields the base interval for both policies.
    pub fn next_retry_interval(&self, retry_count: u32) -> Duration {
        match self.retry_backoff {
            RetryBackoff::Fixed => self.retry_interval,
            RetryBackoff::Exponential => {
                let exponent = retry_count.saturating_sub(1).min(i32::MAX as u32) as i32;
                self.retry_interval
                    .mul_f64(self.exponential_factor.powi(exponent).max(0.0).min(u32::MAX as f64))
            }
        }
    }

    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retry
    }
}
