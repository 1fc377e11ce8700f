use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::utils::constants::METRICS_PREFIX;

// Declare the static OnceCell to hold the process-wide Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> prometheus::Result<&'static Arc<Metrics>> {
    METRICS_INSTANCE
        .get_or_try_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new().map(Arc::new)
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Handler metrics
    pub handler_invocations: IntCounter,
    pub handler_failures: IntCounterVec,
    pub handler_duration: Histogram,

    // Request decisions
    pub requests_dropped: IntCounterVec,
    pub requests_deferred: IntCounter,

    // Scheduling
    pub timers_armed: IntCounterVec,
    pub retry_count: IntGauge,
    pub token_expiry_unix: IntGauge,

    pub up: IntGauge,
}

impl Metrics {
    /// Builds a fresh registry; each coordinator in tests can own one without name clashes.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some(METRICS_PREFIX.into()), None)?;

        let metrics = Self {
            handler_invocations: IntCounter::new("handler_invocations_total", "Token handler invocations")?,
            handler_failures: IntCounterVec::new(Opts::new("handler_failures_total", "Token handler failures by reason"), &["reason"])?,
            handler_duration: Histogram::with_opts(HistogramOpts::new("handler_duration_seconds", "Token handler duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]))?,

            requests_dropped: IntCounterVec::new(Opts::new("requests_dropped_total", "Token requests dropped by reason"), &["reason"])?,
            requests_deferred: IntCounter::new("requests_deferred_total", "Token requests deferred behind an in-flight request")?,

            timers_armed: IntCounterVec::new(Opts::new("refresh_timers_armed_total", "Refresh timers armed by kind"), &["kind"])?,
            retry_count: IntGauge::new("retry_count", "Handler attempts since the pause state last changed")?,
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiration of the active token")?,

            up: IntGauge::new("up", "1 if service is healthy")?,
            registry,
        };

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.handler_invocations.clone()))?;
        reg.register(Box::new(metrics.handler_failures.clone()))?;
        reg.register(Box::new(metrics.handler_duration.clone()))?;
        reg.register(Box::new(metrics.requests_dropped.clone()))?;
        reg.register(Box::new(metrics.requests_deferred.clone()))?;
        reg.register(Box::new(metrics.timers_armed.clone()))?;
        reg.register(Box::new(metrics.retry_count.clone()))?;
        reg.register(Box::new(metrics.token_expiry_unix.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}
