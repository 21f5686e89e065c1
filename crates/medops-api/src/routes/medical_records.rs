//! Routes for medical record commands and queries.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use medops_core::command::Command;
use medops_core::view::MedicalRecordView;
use medops_records::application::command_processor::CommandOutcome;
use medops_records::application::query_handlers::{self, RecordEventView, RecordStateView};
use medops_records::domain::commands::{
    AdminAction, AssignDoctor, CreateReservation, RecordCommand, RecordCommandKind, UpdateNote,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// The patient.
    pub user_id: String,
    /// The hospital.
    pub hospital_id: String,
    /// The treatment being booked.
    pub treatment_product_id: String,
    /// Reservation start.
    pub start_time: DateTime<Utc>,
    /// Reservation end.
    pub end_time: DateTime<Utc>,
    /// Memo left by the patient.
    #[serde(default)]
    pub user_memo: String,
    /// Staff note, set on follow-up bookings made by an admin.
    #[serde(default)]
    pub note: String,
}

/// Request body for the status transitions.
#[derive(Debug, Deserialize)]
pub struct AdminActionRequest {
    /// The acting admin.
    pub admin_id: String,
}

/// Request body for PATCH /{record_id}/doctor.
#[derive(Debug, Deserialize)]
pub struct AssignDoctorRequest {
    /// The doctor to assign.
    pub doctor_id: String,
    /// The acting admin.
    pub admin_id: String,
}

/// Request body for PATCH /{record_id}/note.
#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    /// The new note.
    pub note: String,
}

/// The `{action}` segment of PATCH /{record_id}/status/{action}.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusAction {
    /// PENDING to RESERVED.
    Confirm,
    /// Back to PENDING.
    Pending,
    /// To CANCELED.
    Cancel,
    /// To COMPLETED.
    Complete,
}

impl StatusAction {
    fn into_kind(self, action: AdminAction) -> RecordCommandKind {
        match self {
            Self::Confirm => RecordCommandKind::Confirm(action),
            Self::Pending => RecordCommandKind::Pending(action),
            Self::Cancel => RecordCommandKind::Cancel(action),
            Self::Complete => RecordCommandKind::Complete(action),
        }
    }
}

/// Query string of GET /hospitals/{hospital_id}.
#[derive(Debug, Deserialize)]
pub struct TimeRangeQuery {
    /// Inclusive lower bound on `start_time`.
    pub start_time: DateTime<Utc>,
    /// Inclusive upper bound on `end_time`.
    pub end_time: DateTime<Utc>,
}

/// Query string of GET /users/{user_id}.
#[derive(Debug, Deserialize)]
pub struct UserRecordsQuery {
    /// Restricts the listing to one hospital.
    pub hospital_id: Option<String>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The stream the command targeted.
    pub record_id: String,
    /// Stream version after the command.
    pub version: i64,
    /// IDs of the facts appended.
    pub event_ids: Vec<Uuid>,
}

impl From<CommandOutcome> for CommandResponse {
    fn from(outcome: CommandOutcome) -> Self {
        Self {
            event_ids: outcome.events.iter().map(|e| e.metadata.event_id).collect(),
            record_id: outcome.record_id,
            version: outcome.version,
        }
    }
}

async fn dispatch(state: &AppState, command: RecordCommand) -> Result<CommandResponse, ApiError> {
    info!(
        correlation_id = %command.correlation_id(),
        command_type = command.command_type(),
        "handling command"
    );
    let outcome = state.processor.handle(&command).await?;
    Ok(outcome.into())
}

/// POST /
#[instrument(skip(state, request), fields(hospital_id = %request.hospital_id))]
async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = RecordCommand::new(
        Uuid::new_v4().to_string(),
        request.user_id,
        request.hospital_id,
        RecordCommandKind::ReservationCreate(CreateReservation {
            treatment_product_id: request.treatment_product_id,
            start_time: request.start_time,
            end_time: request.end_time,
            user_memo: request.user_memo,
            note: request.note,
        }),
    );
    let response = dispatch(&state, command).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PATCH /{record_id}/status/{action}
#[instrument(skip(state, request), fields(record_id = %record_id))]
async fn change_status(
    State(state): State<AppState>,
    Path((record_id, action)): Path<(String, StatusAction)>,
    Json(request): Json<AdminActionRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let kind = action.into_kind(AdminAction {
        admin_id: request.admin_id,
    });
    let response = dispatch(&state, RecordCommand::for_record(record_id, kind)).await?;
    Ok(Json(response))
}

/// PATCH /{record_id}/doctor
#[instrument(skip(state, request), fields(record_id = %record_id))]
async fn assign_doctor(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(request): Json<AssignDoctorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let kind = RecordCommandKind::AssignDoctor(AssignDoctor {
        doctor_id: request.doctor_id,
        admin_id: request.admin_id,
    });
    let response = dispatch(&state, RecordCommand::for_record(record_id, kind)).await?;
    Ok(Json(response))
}

/// PATCH /{record_id}/note
#[instrument(skip(state, request), fields(record_id = %record_id))]
async fn update_note(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let kind = RecordCommandKind::UpdateNote(UpdateNote { note: request.note });
    let response = dispatch(&state, RecordCommand::for_record(record_id, kind)).await?;
    Ok(Json(response))
}

/// GET /{record_id}
#[instrument(skip(state))]
async fn get_medical_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<MedicalRecordView>, ApiError> {
    let view = query_handlers::get_medical_record_view(&record_id, &*state.views).await?;
    Ok(Json(view))
}

/// GET /{record_id}/events
#[instrument(skip(state))]
async fn get_record_events(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<Vec<RecordEventView>>, ApiError> {
    let events = query_handlers::get_record_events(&record_id, &state.processor).await?;
    Ok(Json(events))
}

/// GET /{record_id}/state
#[instrument(skip(state))]
async fn get_record_state(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<Json<RecordStateView>, ApiError> {
    let record = query_handlers::get_record_state(&record_id, &state.processor).await?;
    Ok(Json(record))
}

/// GET /hospitals/{hospital_id}?start_time&end_time
#[instrument(skip(state, range))]
async fn list_hospital_records(
    State(state): State<AppState>,
    Path(hospital_id): Path<String>,
    Query(range): Query<TimeRangeQuery>,
) -> Result<Json<Vec<MedicalRecordView>>, ApiError> {
    let views = query_handlers::list_by_hospital_in_range(
        &hospital_id,
        range.start_time,
        range.end_time,
        &*state.views,
    )
    .await?;
    Ok(Json(views))
}

/// GET /users/{user_id}[?hospital_id]
#[instrument(skip(state, query))]
async fn list_user_records(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserRecordsQuery>,
) -> Result<Json<Vec<MedicalRecordView>>, ApiError> {
    let views =
        query_handlers::list_by_user(&user_id, query.hospital_id.as_deref(), &*state.views).await?;
    Ok(Json(views))
}

/// Returns the router for medical records.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation))
        .route("/{record_id}", get(get_medical_record))
        .route("/{record_id}/events", get(get_record_events))
        .route("/{record_id}/state", get(get_record_state))
        .route("/{record_id}/status/{action}", patch(change_status))
        .route("/{record_id}/doctor", patch(assign_doctor))
        .route("/{record_id}/note", patch(update_note))
        .route("/hospitals/{hospital_id}", get(list_hospital_records))
        .route("/users/{user_id}", get(list_user_records))
}
