//! Facts for the medical record context.

use std::fmt;

use chrono::{DateTime, Utc};
use medops_core::error::DomainError;
use medops_core::event::{DomainEvent, EventMetadata};
use medops_core::repository::StoredEvent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Emitted when a reservation is booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCreated {
    /// The patient.
    pub user_id: String,
    /// The hospital.
    pub hospital_id: String,
    /// The booked treatment.
    pub treatment_product_id: String,
    /// Reservation start.
    pub start_time: DateTime<Utc>,
    /// Reservation end.
    pub end_time: DateTime<Utc>,
    /// Memo left by the patient.
    pub user_memo: String,
    /// Staff note.
    pub note: String,
}

/// Emitted when an admin changes the reservation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    /// The acting admin.
    pub admin_id: String,
    /// The acting admin's name, resolved at write time.
    pub admin_name: String,
}

/// Emitted when a doctor is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorAssigned {
    /// The assigned doctor.
    pub doctor_id: String,
    /// The doctor's name, resolved at write time.
    pub doctor_name: String,
    /// The acting admin.
    pub admin_id: String,
    /// The acting admin's name, resolved at write time.
    pub admin_name: String,
}

/// Emitted when the staff note is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdated {
    /// The new note.
    pub note: String,
}

/// Tag identifying a fact kind. Stored alongside every fact and used as the
/// handler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// See [`ReservationCreated`].
    ReservationCreated,
    /// Reservation confirmed.
    Confirmed,
    /// Reservation put back to pending.
    Pending,
    /// Reservation canceled.
    Canceled,
    /// Reservation completed.
    Completed,
    /// See [`DoctorAssigned`].
    DoctorAssigned,
    /// See [`NoteUpdated`].
    NoteUpdated,
}

impl EventType {
    /// Every fact kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::ReservationCreated,
        Self::Confirmed,
        Self::Pending,
        Self::Canceled,
        Self::Completed,
        Self::DoctorAssigned,
        Self::NoteUpdated,
    ];

    /// Stable tag written to the fact log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReservationCreated => "medical_record.reservation_created",
            Self::Confirmed => "medical_record.confirmed",
            Self::Pending => "medical_record.pending",
            Self::Canceled => "medical_record.canceled",
            Self::Completed => "medical_record.completed",
            Self::DoctorAssigned => "medical_record.doctor_assigned",
            Self::NoteUpdated => "medical_record.note_updated",
        }
    }

    /// Resolves a stored tag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` for unknown tags.
    pub fn from_tag(tag: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| DomainError::Deserialization(format!("unknown event type: {tag}")))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific fact payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEventKind {
    /// A reservation was booked.
    ReservationCreated(ReservationCreated),
    /// The reservation was confirmed.
    Confirmed(StatusChanged),
    /// The reservation was put back to pending.
    Pending(StatusChanged),
    /// The reservation was canceled.
    Canceled(StatusChanged),
    /// The reservation was completed.
    Completed(StatusChanged),
    /// A doctor was assigned.
    DoctorAssigned(DoctorAssigned),
    /// The staff note was replaced.
    NoteUpdated(NoteUpdated),
}

fn encode<T: Serialize>(payload: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(payload)
        .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))
}

fn decode<T: DeserializeOwned>(
    event_type: EventType,
    payload: &serde_json::Value,
) -> Result<T, DomainError> {
    T::deserialize(payload).map_err(|e| {
        DomainError::Deserialization(format!("invalid {event_type} payload: {e}"))
    })
}

impl RecordEventKind {
    /// Returns the tag of this kind.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::ReservationCreated(_) => EventType::ReservationCreated,
            Self::Confirmed(_) => EventType::Confirmed,
            Self::Pending(_) => EventType::Pending,
            Self::Canceled(_) => EventType::Canceled,
            Self::Completed(_) => EventType::Completed,
            Self::DoctorAssigned(_) => EventType::DoctorAssigned,
            Self::NoteUpdated(_) => EventType::NoteUpdated,
        }
    }

    /// Serializes the kind-specific fields to a generic payload. The tag is
    /// stored separately.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if encoding fails.
    pub fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::ReservationCreated(p) => encode(p),
            Self::Confirmed(p) | Self::Pending(p) | Self::Canceled(p) | Self::Completed(p) => {
                encode(p)
            }
            Self::DoctorAssigned(p) => encode(p),
            Self::NoteUpdated(p) => encode(p),
        }
    }

    /// Rebuilds a typed payload from its stored tag and generic fields.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` for unknown tags or payloads
    /// that do not match the tag's shape.
    pub fn from_payload(event_type: &str, payload: &serde_json::Value) -> Result<Self, DomainError> {
        let kind = EventType::from_tag(event_type)?;
        Ok(match kind {
            EventType::ReservationCreated => Self::ReservationCreated(decode(kind, payload)?),
            EventType::Confirmed => Self::Confirmed(decode(kind, payload)?),
            EventType::Pending => Self::Pending(decode(kind, payload)?),
            EventType::Canceled => Self::Canceled(decode(kind, payload)?),
            EventType::Completed => Self::Completed(decode(kind, payload)?),
            EventType::DoctorAssigned => Self::DoctorAssigned(decode(kind, payload)?),
            EventType::NoteUpdated => Self::NoteUpdated(decode(kind, payload)?),
        })
    }
}

/// Fact envelope for the medical record context.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    /// Fact metadata.
    pub metadata: EventMetadata,
    /// Kind-specific payload.
    pub kind: RecordEventKind,
}

impl RecordEvent {
    /// Converts to the storage row shape.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be encoded.
    pub fn to_stored(&self) -> Result<StoredEvent, DomainError> {
        let meta = &self.metadata;
        Ok(StoredEvent {
            event_id: meta.event_id,
            record_id: meta.record_id.clone(),
            event_type: self.event_type().to_owned(),
            hospital_id: meta.hospital_id.clone(),
            user_id: meta.user_id.clone(),
            version: meta.version,
            status: meta.status,
            payload: self.to_payload()?,
            correlation_id: meta.correlation_id,
            occurred_at: meta.occurred_at,
        })
    }

    /// Rebuilds a typed fact from a storage row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if the tag is unknown or the
    /// payload is malformed.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let kind = RecordEventKind::from_payload(&stored.event_type, &stored.payload)?;
        Ok(Self {
            metadata: EventMetadata {
                event_id: stored.event_id,
                event_type: stored.event_type.clone(),
                record_id: stored.record_id.clone(),
                hospital_id: stored.hospital_id.clone(),
                user_id: stored.user_id.clone(),
                version: stored.version,
                status: stored.status,
                correlation_id: stored.correlation_id,
                occurred_at: stored.occurred_at,
            },
            kind,
        })
    }
}

impl DomainEvent for RecordEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type().as_str()
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        self.kind.to_payload()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
