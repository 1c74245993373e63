//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: i64,
    pub reminders_enabled: bool,
}

/// GET /health
///
/// No tenant context required.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "metro-cal".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: (metro_common::time::now() - state.startup_time).num_seconds(),
        reminders_enabled: state.reminders.is_some(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
