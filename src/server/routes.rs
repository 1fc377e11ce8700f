use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::scheduler::RefreshKind;
use crate::auth::state::StateSnapshot;
use crate::parser::jwt::decode_expiration;
use crate::server::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub has_token: bool,
    pub expires_at: Option<i64>,
    pub state: StateSnapshot,
    pub armed_refresh: Option<ArmedRefreshView>,
}

#[derive(Debug, Serialize)]
pub struct ArmedRefreshView {
    pub kind: RefreshKind,
    pub remaining_ms: u64,
}

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/refresh", post(refresh))
        .route("/auth/pause", post(pause))
        .route("/auth/resume", post(resume))
        .route("/auth/reset", post(reset_failed))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let token = state.reader.token();
    Json(HealthResponse {
        has_token: token.is_some(),
        expires_at: token.and_then(|t| decode_expiration(&t).ok()),
        state: state.coordinator.snapshot(),
        armed_refresh: state.coordinator.armed_refresh().map(|armed| ArmedRefreshView {
            kind: armed.kind,
            remaining_ms: armed.remaining().as_millis() as u64,
        }),
    })
}

async fn refresh(State(state): State<AppState>) -> StatusCode {
    state.coordinator.request_new_token(false);
    StatusCode::ACCEPTED
}

async fn pause(State(state): State<AppState>) -> StatusCode {
    state.coordinator.pause_retries(true);
    StatusCode::NO_CONTENT
}

async fn resume(State(state): State<AppState>) -> StatusCode {
    state.coordinator.pause_retries(false);
    StatusCode::NO_CONTENT
}

async fn reset_failed(State(state): State<AppState>) -> StatusCode {
    state.coordinator.reset_failed_auth();
    StatusCode::NO_CONTENT
}
