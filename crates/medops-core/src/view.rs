//! Denormalized read model for medical records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::status::RecordStatus;

/// Query-optimized view row, one per stream.
///
/// Rows are immutable values: every change writes a whole new row. `version`
/// lets consumers spot stale or missing facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecordView {
    /// The stream identifier.
    pub record_id: String,
    /// Patient identifier.
    pub user_id: String,
    /// Patient display name.
    pub user_name: String,
    /// Hospital identifier.
    pub hospital_id: String,
    /// Hospital display name.
    pub hospital_name: String,
    /// Assigned doctor, if any.
    pub doctor_id: Option<String>,
    /// Assigned doctor's display name, if any.
    pub doctor_name: Option<String>,
    /// Staff note.
    pub note: String,
    /// Current status.
    pub status: RecordStatus,
    /// Reservation start.
    pub start_time: DateTime<Utc>,
    /// Reservation end.
    pub end_time: DateTime<Utc>,
    /// Booked treatment product.
    pub treatment_product_id: String,
    /// Booked treatment product's display name.
    pub treatment_product_name: String,
    /// Memo left by the patient.
    pub user_memo: String,
    /// Version of the last fact applied to this row.
    pub version: i64,
}

/// Storage for [`MedicalRecordView`] rows.
#[async_trait]
pub trait ViewRepository: Send + Sync {
    /// Load a single row by stream id.
    async fn find_by_id(&self, record_id: &str) -> Result<Option<MedicalRecordView>, DomainError>;

    /// Insert or fully replace a row. A row already at `view.version` or
    /// later is left as is.
    async fn save(&self, view: &MedicalRecordView) -> Result<(), DomainError>;

    /// Rows of a hospital with `start_time >= start` and `end_time <= end`,
    /// ordered by `start_time` ascending.
    async fn find_by_hospital_in_range(
        &self,
        hospital_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError>;

    /// Rows of a treatment product inside `[start, end]`, ordered by
    /// `start_time` ascending.
    async fn find_by_treatment_product_in_range(
        &self,
        treatment_product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError>;

    /// Rows of a patient, newest reservation first.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<MedicalRecordView>, DomainError>;

    /// Rows of a patient at one hospital, newest reservation first.
    async fn find_by_user_and_hospital(
        &self,
        user_id: &str,
        hospital_id: &str,
    ) -> Result<Vec<MedicalRecordView>, DomainError>;
}
