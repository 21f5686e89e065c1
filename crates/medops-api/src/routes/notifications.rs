//! Server-sent event stream for hospital dashboards.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use medops_notifications::Notification;
use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::instrument;

use crate::state::AppState;

/// Response body of GET /status.
#[derive(Debug, Serialize)]
pub struct ConnectionStatusResponse {
    /// Live subscriptions per hospital.
    pub hospitals: BTreeMap<String, usize>,
    /// Live subscriptions overall.
    pub total: usize,
}

fn to_sse(notification: &Notification) -> Event {
    Event::default()
        .event(notification.event.as_str())
        .data(notification.data.to_string())
}

/// GET /hospitals/{hospital_id}/stream
///
/// The first event is always `CONNECTED`. The subscription ends when the
/// client disconnects and the stream is dropped.
#[instrument(skip(state))]
async fn stream(
    State(state): State<AppState>,
    Path(hospital_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe(&hospital_id);
    let events = ReceiverStream::new(receiver).map(|notification| Ok(to_sse(&notification)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /status
async fn connection_status(State(state): State<AppState>) -> Json<ConnectionStatusResponse> {
    let hospitals = state.hub.connection_status();
    let total = hospitals.values().sum();
    Json(ConnectionStatusResponse { hospitals, total })
}

/// Returns the router for notifications.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hospitals/{hospital_id}/stream", get(stream))
        .route("/status", get(connection_status))
}
