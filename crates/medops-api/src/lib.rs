//! MedOps: HTTP and SSE surface.
//!
//! Thin adapters over the medical record processor, the read model, and the
//! notification hub. The binary in `main.rs` wires them to PostgreSQL.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with the dashboard origins once they are fixed.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/medical-records", routes::medical_records::router())
        .nest("/api/v1/notifications", routes::notifications::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
