//! Liveness endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
    /// Service name, as reported to the span exporter.
    pub service: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Open notification streams across all hospitals.
    pub live_subscriptions: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: crate::telemetry::SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        live_subscriptions: state.hub.connection_status().values().sum(),
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
