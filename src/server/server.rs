use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::auth::coordinator::TokenRefreshCoordinator;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::Metrics;
use crate::observability::routes::MetricsState;
use crate::server::routes::auth_router;
use crate::sinks::active_token::ActiveTokenReader;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: TokenRefreshCoordinator,
    pub reader: ActiveTokenReader,
    pub metrics_state: Option<MetricsState>,
}

impl AppState {
    pub fn new(
        coordinator: TokenRefreshCoordinator,
        reader: ActiveTokenReader,
        metrics: Option<&Metrics>,
    ) -> Self {
        Self {
            coordinator,
            reader,
            metrics_state: metrics.map(|m| MetricsState::new(m.registry.clone())),
        }
    }
}

pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(auth_router())
        .merge(MetricsState::router(&settings_config.metrics))
        .with_state(state)
}

/// Serve the control plane until the process stops. No-op without `settings.server`.
pub async fn start(settings_config: &SettingsConfig, state: AppState) -> Result<()> {
    let Some(server) = &settings_config.server else {
        info!("no server configured, control plane disabled");
        return Ok(());
    };

    let app = router(settings_config, state);
    let address = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding control plane to {}", address))?;
    info!(address = %address, "control plane listening");

    axum::serve(listener, app).await.context("control plane server")?;
    Ok(())
}
