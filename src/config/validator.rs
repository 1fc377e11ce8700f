//! Configuration validation with aggregated errors: every issue is collected into one list
//! so a broken config is reported in a single pass.

use http::HeaderName;
use std::collections::HashMap;
use tracing::{error, info};

use crate::config::handler::{GenericSourceValue, HandlerConfig};
use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::types::ServiceConfig;

static LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);

    if let Some(handler) = &cfg.handler {
        validate_handler(handler, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    if let Some(period) = settings.expiring_auth_token_refresh_period_ms {
        if period > 1000 * 60 * 60 * 24 * 365 {
            errors.push(format!(
                "settings.expiring_auth_token_refresh_period_ms ({}) is unreasonably large",
                period
            ));
        }
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }

    if let Some(server) = &settings.server {
        if server.host.is_empty() {
            errors.push("settings.server.host must not be empty".to_string());
        }
        if server.port.parse::<u16>().is_err() {
            errors.push(format!(
                "settings.server.port '{}' must be a number in 0..=65535",
                server.port
            ));
        }
    }

    if settings.metrics.is_enabled {
        if !settings.metrics.path.starts_with('/') {
            errors.push(format!(
                "settings.metrics.path '{}' must start with '/'",
                settings.metrics.path
            ));
        }
        if settings.server.is_none() {
            errors.push("settings.metrics.is_enabled requires settings.server".to_string());
        }
    }
}

fn validate_retry(ctx: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(interval) = retry.retry_interval_ms {
        if interval == 0 {
            errors.push(format!("{}.retry_interval_ms must be > 0", ctx));
        }
    }
    if let Some(factor) = retry.exponential_factor {
        if !factor.is_finite() || factor < 1.0 {
            errors.push(format!(
                "{}.exponential_factor ({}) must be a finite number >= 1.0",
                ctx, factor
            ));
        }
    }
}

/// HANDLER VALIDATION
fn validate_handler(handler: &HandlerConfig, errors: &mut Vec<String>) {
    if !(handler.url.starts_with("http://") || handler.url.starts_with("https://")) {
        errors.push(format!(
            "handler.url '{}' must start with http:// or https://",
            handler.url
        ));
    }

    if let Some(pointer) = &handler.token_pointer {
        if !pointer.starts_with('/') {
            errors.push(format!(
                "handler.token_pointer '{}' must be a JSON pointer starting with '/'",
                pointer
            ));
        }
    }

    if handler.timeout_ms == Some(0) {
        errors.push("handler.timeout_ms must be > 0".to_string());
    }

    if let Some(headers) = &handler.headers {
        for name in headers.keys() {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(format!("handler.headers['{}'] is not a valid header name", name));
            }
        }
        validate_values("handler.headers", headers, errors);
    }
    if let Some(body) = &handler.body {
        validate_values("handler.body", body, errors);
    }
}

fn validate_values(
    ctx: &str,
    values: &HashMap<String, GenericSourceValue>,
    errors: &mut Vec<String>,
) {
    for (key, value) in values {
        match value {
            GenericSourceValue::Literal { .. } => {}
            GenericSourceValue::FromEnv { from_env } if from_env.is_empty() => {
                errors.push(format!("{}['{}'].from_env must not be empty", ctx, key));
            }
            GenericSourceValue::FromFile { path } if path.is_empty() => {
                errors.push(format!("{}['{}'].path must not be empty", ctx, key));
            }
            _ => {}
        }
    }
}
