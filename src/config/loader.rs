use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::LoggingConfig;
use crate::config::types::ServiceConfig;
use crate::config::validator::validate_service_config;

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config file {}", path.display()))?;

    let expanded = expand_env_vars(&content)?;
    parse_config(&expanded)
}

pub fn parse_config(content: &str) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(content)
        .inspect_err(|e| error!("parse config error: {}", e))
        .map_err(|e| anyhow!("Invalid config format: {}", e))?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::default());
    }

    debug!("validation config ...");
    if let Err(errors) = validate_service_config(&service_config) {
        bail!(
            "config is not valid, total errors: {}\n{}",
            errors.len(),
            errors.join("\n")
        );
    }

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with the environment value or the default.
pub fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    Ok(re
        .replace_all(input, |caps: &regex::Captures| {
            let var = &caps[1];
            let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var).unwrap_or_else(|_| default.to_string())
        })
        .to_string())
}
