//! MedOps API server entry point.

use std::sync::Arc;
use std::time::Duration;

use medops_api::config::AppConfig;
use medops_api::error::AppError;
use medops_api::state::{AppState, Ports};
use medops_api::{app, telemetry};
use medops_event_store::schema;
use sqlx::postgres::PgPoolOptions;

/// How often closed dashboard subscriptions are swept.
const PRUNE_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting MedOps API server");

    // Create database connection pool and make sure the tables exist.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    schema::apply(&pool).await?;

    let state = AppState::wire(Ports::postgres(&pool), &config.engine)?;

    let hub = Arc::clone(&state.hub);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            hub.prune();
        }
    });

    let addr = config.bind_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
