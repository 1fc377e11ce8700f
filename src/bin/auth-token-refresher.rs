use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use auth_token_refresher::auth::TokenRefreshCoordinator;
use auth_token_refresher::config::loader::file_to_config;
use auth_token_refresher::observability::metrics::get_metrics;
use auth_token_refresher::server;
use auth_token_refresher::server::server::AppState;
use auth_token_refresher::sinks::ActiveTokenSink;
use auth_token_refresher::sources::HttpTokenHandler;
use auth_token_refresher::utils::logging;
use auth_token_refresher::utils::logging::LogLevel;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "auth-token-refresher.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = file_to_config(Path::new(&args.config)).await?;
    logging::run(&service_config, args.log_level);

    let metrics = get_metrics().await?.clone();

    // -------------------------------
    // 2. Build collaborators
    // -------------------------------

    let sink = Arc::new(ActiveTokenSink::new());
    let reader = sink.reader();

    let mut builder = TokenRefreshCoordinator::builder()
        .sink(sink)
        .session(Arc::new(service_config.session.clone()))
        .retry_policy(service_config.settings.retry_policy())
        .expiring_auth_token_refresh_period(
            service_config.settings.expiring_auth_token_refresh_period(),
        )
        .metrics(metrics.clone());

    match &service_config.handler {
        Some(handler_config) => {
            builder = builder.handler(Arc::new(HttpTokenHandler::new(handler_config.clone())?));
        }
        None => warn!("no handler configured, tokens cannot be requested"),
    }

    // -------------------------------
    // 3. Request the first token
    // -------------------------------

    let coordinator = builder.spawn();
    coordinator.request_new_token(false);

    // -------------------------------
    // 4. Serve the control plane until Ctrl-C
    // -------------------------------

    let state = AppState::new(coordinator.clone(), reader, Some(&*metrics));
    metrics.up.set(1);
    info!("Service starting...");

    tokio::select! {
        res = server::server::start(&service_config.settings, state) => {
            res?;
            tokio::signal::ctrl_c().await?;
        }
        res = tokio::signal::ctrl_c() => res?,
    }

    info!("shutting down");
    metrics.up.set(0);
    coordinator.clear_refresh_timer();
    Ok(())
}
