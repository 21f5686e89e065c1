//! Aggregate state for the medical record context.

use chrono::{DateTime, Utc};
use medops_core::error::DomainError;
use medops_core::repository::StoredSnapshot;
use medops_core::status::RecordStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking details. Empty until a reservation is created.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reservation {
    /// The booked treatment.
    pub treatment_product_id: Option<String>,
    /// Reservation start.
    pub start_time: Option<DateTime<Utc>>,
    /// Reservation end.
    pub end_time: Option<DateTime<Utc>>,
    /// Memo left by the patient.
    pub user_memo: String,
}

/// Current state of one medical record stream.
///
/// Only ever held in memory and inside snapshots; the fact log is the
/// system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecord {
    /// Stream identifier.
    pub id: String,
    /// The patient.
    pub user_id: String,
    /// The hospital.
    pub hospital_id: String,
    /// Assigned doctor.
    pub doctor: Option<String>,
    /// Staff note.
    pub note: String,
    /// Lifecycle status.
    pub status: RecordStatus,
    /// Booking details.
    pub reservation: Reservation,
}

impl MedicalRecord {
    /// The state of a stream with no facts.
    #[must_use]
    pub fn seed(record_id: &str) -> Self {
        Self {
            id: record_id.to_owned(),
            user_id: String::new(),
            hospital_id: String::new(),
            doctor: None,
            note: String::new(),
            status: RecordStatus::Pending,
            reservation: Reservation::default(),
        }
    }
}

/// Aggregate state at a known stream version.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicalRecordSnapshot {
    /// Snapshot row identifier.
    pub snapshot_id: Uuid,
    /// Stream identifier.
    pub record_id: String,
    /// When this snapshot was computed.
    pub created_at: DateTime<Utc>,
    /// Number of facts folded into `state`.
    pub version: i64,
    /// The folded state.
    pub state: MedicalRecord,
}

impl MedicalRecordSnapshot {
    /// Version 0 snapshot for a stream with no snapshot on record.
    #[must_use]
    pub fn seed(record_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            record_id: record_id.to_owned(),
            created_at: now,
            version: 0,
            state: MedicalRecord::seed(record_id),
        }
    }

    /// Returns `true` when at least one fact has been folded.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// Converts to the storage row shape.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the state cannot be encoded.
    pub fn to_stored(&self) -> Result<StoredSnapshot, DomainError> {
        let state = serde_json::to_value(&self.state).map_err(|e| {
            DomainError::Infrastructure(format!("snapshot serialization failed: {e}"))
        })?;
        Ok(StoredSnapshot {
            snapshot_id: self.snapshot_id,
            record_id: self.record_id.clone(),
            version: self.version,
            state,
            created_at: self.created_at,
        })
    }

    /// Rebuilds a snapshot from a storage row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` if the stored state is malformed.
    pub fn from_stored(stored: &StoredSnapshot) -> Result<Self, DomainError> {
        let state = MedicalRecord::deserialize(&stored.state).map_err(|e| {
            DomainError::Deserialization(format!(
                "invalid snapshot state for record {}: {e}",
                stored.record_id
            ))
        })?;
        Ok(Self {
            snapshot_id: stored.snapshot_id,
            record_id: stored.record_id.clone(),
            created_at: stored.created_at,
            version: stored.version,
            state,
        })
    }
}
