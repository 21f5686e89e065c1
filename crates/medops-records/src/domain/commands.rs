//! Commands for the medical record context.

use std::fmt;

use chrono::{DateTime, Utc};
use medops_core::command::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag identifying a command kind. Used as the executor registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Book a new reservation.
    ReservationCreate,
    /// Confirm a reservation.
    Confirm,
    /// Put a reservation back to pending.
    Pending,
    /// Cancel a reservation.
    Cancel,
    /// Mark a reservation as completed.
    Complete,
    /// Assign a doctor.
    AssignDoctor,
    /// Replace the staff note.
    UpdateNote,
}

impl CommandType {
    /// Every command kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::ReservationCreate,
        Self::Confirm,
        Self::Pending,
        Self::Cancel,
        Self::Complete,
        Self::AssignDoctor,
        Self::UpdateNote,
    ];

    /// Stable tag for logging and routing.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReservationCreate => "medical_record.create_reservation",
            Self::Confirm => "medical_record.confirm",
            Self::Pending => "medical_record.pending",
            Self::Cancel => "medical_record.cancel",
            Self::Complete => "medical_record.complete",
            Self::AssignDoctor => "medical_record.assign_doctor",
            Self::UpdateNote => "medical_record.update_note",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields for booking a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReservation {
    /// The treatment being booked.
    pub treatment_product_id: String,
    /// Reservation start.
    pub start_time: DateTime<Utc>,
    /// Reservation end.
    pub end_time: DateTime<Utc>,
    /// Memo left by the patient.
    pub user_memo: String,
    /// Staff note (used for follow-up bookings).
    pub note: String,
}

/// Fields for an admin-driven status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAction {
    /// The acting admin.
    pub admin_id: String,
}

/// Fields for assigning a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignDoctor {
    /// The doctor to assign.
    pub doctor_id: String,
    /// The acting admin.
    pub admin_id: String,
}

/// Fields for replacing the staff note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNote {
    /// The new note.
    pub note: String,
}

/// Kind-specific command fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordCommandKind {
    /// Book a new reservation.
    ReservationCreate(CreateReservation),
    /// Confirm a reservation.
    Confirm(AdminAction),
    /// Put a reservation back to pending.
    Pending(AdminAction),
    /// Cancel a reservation.
    Cancel(AdminAction),
    /// Mark a reservation as completed.
    Complete(AdminAction),
    /// Assign a doctor.
    AssignDoctor(AssignDoctor),
    /// Replace the staff note.
    UpdateNote(UpdateNote),
}

impl RecordCommandKind {
    /// Returns the tag of this kind.
    #[must_use]
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::ReservationCreate(_) => CommandType::ReservationCreate,
            Self::Confirm(_) => CommandType::Confirm,
            Self::Pending(_) => CommandType::Pending,
            Self::Cancel(_) => CommandType::Cancel,
            Self::Complete(_) => CommandType::Complete,
            Self::AssignDoctor(_) => CommandType::AssignDoctor,
            Self::UpdateNote(_) => CommandType::UpdateNote,
        }
    }
}

/// An intent to change one medical record stream. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCommand {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The target stream.
    pub record_id: String,
    /// The patient the reservation belongs to. Only read on creation; later
    /// facts take it from the stream.
    pub user_id: String,
    /// The hospital that owns the reservation. Only read on creation.
    pub hospital_id: String,
    /// Kind-specific fields.
    pub kind: RecordCommandKind,
}

impl RecordCommand {
    /// Creates a command with a fresh correlation ID.
    #[must_use]
    pub fn new(
        record_id: impl Into<String>,
        user_id: impl Into<String>,
        hospital_id: impl Into<String>,
        kind: RecordCommandKind,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            record_id: record_id.into(),
            user_id: user_id.into(),
            hospital_id: hospital_id.into(),
            kind,
        }
    }

    /// Creates a command against an existing stream, whose patient and
    /// hospital are already known.
    #[must_use]
    pub fn for_record(record_id: impl Into<String>, kind: RecordCommandKind) -> Self {
        Self::new(record_id, String::new(), String::new(), kind)
    }

    /// Returns the tag of this command's kind.
    #[must_use]
    pub fn kind_type(&self) -> CommandType {
        self.kind.command_type()
    }
}

impl Command for RecordCommand {
    fn command_type(&self) -> &'static str {
        self.kind.command_type().as_str()
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn record_id(&self) -> &str {
        &self.record_id
    }
}
