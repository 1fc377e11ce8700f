use clap::ValueEnum;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::settings::{LogFormat, LoggingConfig};
use crate::config::types::ServiceConfig;

/// `--log-level` values; wins over `settings.logging.level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging settings after applying the CLI override on top of the config file.
pub fn resolve_logging_config(
    service_config: &ServiceConfig,
    cli_level: Option<LogLevel>,
) -> LoggingConfig {
    let mut config = service_config.settings.logging.clone().unwrap_or_default();
    if let Some(level) = cli_level {
        config.level = level.as_filter().to_owned();
    }
    config
}

pub fn run(service_config: &ServiceConfig, cli_level: Option<LogLevel>) {
    init_logging(&resolve_logging_config(service_config, cli_level));
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(cfg: &LoggingConfig) {
    // RUST_LOG-style directives are accepted too, e.g. "info,auth_token_refresher=debug"
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match cfg.format {
        // no ANSI codes for CRI log parsers
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_timer(UtcTime::rfc_3339()))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}
