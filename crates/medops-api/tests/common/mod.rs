//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use medops_api::config::EngineConfig;
use medops_api::state::{AppState, Ports};
use medops_test_support::{
    FixedClock, InMemoryEventStore, InMemorySnapshotStore, InMemoryViewRepository, StaticDirectory,
};
use tower::ServiceExt;

/// In-memory ports behind the clinic directory and a fixed clock.
pub fn in_memory_ports() -> Ports {
    Ports {
        event_store: Arc::new(InMemoryEventStore::new()),
        snapshot_store: Arc::new(InMemorySnapshotStore::new()),
        views: Arc::new(InMemoryViewRepository::new()),
        directory: Arc::new(StaticDirectory::clinic()),
        clock: Arc::new(FixedClock::default()),
    }
}

/// Wires the state the same way `main.rs` does, over in-memory ports.
pub fn build_test_state() -> AppState {
    AppState::wire(in_memory_ports(), &EngineConfig::default()).unwrap()
}

/// Build the full app router. Clones share the same state.
pub fn build_test_app() -> Router {
    medops_api::app(build_test_state())
}

/// A reservation for patient U1 at hospital H1, 10:00 to 10:30.
pub fn reservation_body() -> serde_json::Value {
    reservation_at("2026-01-15T10:00:00Z", "2026-01-15T10:30:00Z")
}

/// A reservation for patient U1 at hospital H1 in the given window.
pub fn reservation_at(start: &str, end: &str) -> serde_json::Value {
    serde_json::json!({
        "user_id": "U1",
        "hospital_id": "H1",
        "treatment_product_id": "P1",
        "start_time": start,
        "end_time": end,
        "user_memo": "first visit"
    })
}

/// Send a request with an optional JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "POST", uri, Some(body)).await
}

/// Send a PATCH request with a JSON body and return the response.
pub async fn patch_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "PATCH", uri, Some(body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send_json(app, "GET", uri, None).await
}

/// Books the default reservation and returns its record id.
pub async fn create_reservation(app: &Router) -> String {
    let (status, json) =
        post_json(app.clone(), "/api/v1/medical-records", &reservation_body()).await;
    assert_eq!(status, StatusCode::CREATED);
    json["record_id"].as_str().unwrap().to_owned()
}
