//! Query handlers for the medical record context.
//!
//! Read-model lookups go to the [`ViewRepository`]; state and audit-trail
//! queries go through the [`CommandProcessor`] so they see exactly what the
//! write path sees.

use chrono::{DateTime, Utc};
use medops_core::error::DomainError;
use medops_core::status::RecordStatus;
use medops_core::view::{MedicalRecordView, ViewRepository};
use serde::Serialize;
use uuid::Uuid;

use super::command_processor::CommandProcessor;
use crate::domain::aggregates::MedicalRecord;
use crate::domain::events::RecordEvent;

/// Rehydrated aggregate state of one stream.
#[derive(Debug, Serialize)]
pub struct RecordStateView {
    /// The stream.
    pub record_id: String,
    /// Number of facts folded.
    pub version: i64,
    /// The folded state.
    pub state: MedicalRecord,
}

/// One entry of a stream's audit trail.
#[derive(Debug, Serialize)]
pub struct RecordEventView {
    /// The fact identifier.
    pub event_id: Uuid,
    /// The fact kind tag.
    pub event_type: &'static str,
    /// Position in the stream.
    pub version: i64,
    /// Status after this fact.
    pub status: RecordStatus,
    /// The hospital.
    pub hospital_id: String,
    /// The patient.
    pub user_id: String,
    /// Correlation ID of the command that produced the fact.
    pub correlation_id: Uuid,
    /// When the fact was recorded.
    pub occurred_at: DateTime<Utc>,
    /// Kind-specific fields.
    pub payload: serde_json::Value,
}

impl RecordEventView {
    fn from_event(event: &RecordEvent) -> Result<Self, DomainError> {
        let meta = &event.metadata;
        Ok(Self {
            event_id: meta.event_id,
            event_type: event.kind.event_type().as_str(),
            version: meta.version,
            status: meta.status,
            hospital_id: meta.hospital_id.clone(),
            user_id: meta.user_id.clone(),
            correlation_id: meta.correlation_id,
            occurred_at: meta.occurred_at,
            payload: event.kind.to_payload()?,
        })
    }
}

fn require_ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), DomainError> {
    if start > end {
        return Err(DomainError::InvalidCommand(format!(
            "range start {start} is after end {end}"
        )));
    }
    Ok(())
}

/// Retrieves the view row of a record.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no row exists for the ID.
pub async fn get_medical_record_view(
    record_id: &str,
    views: &dyn ViewRepository,
) -> Result<MedicalRecordView, DomainError> {
    views
        .find_by_id(record_id)
        .await?
        .ok_or_else(|| DomainError::not_found("medical_record", record_id))
}

/// Lists a hospital's reservations that start and end inside
/// `[start, end]`, earliest first.
///
/// # Errors
///
/// Returns `DomainError::InvalidCommand` if `start` is after `end`.
pub async fn list_by_hospital_in_range(
    hospital_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    views: &dyn ViewRepository,
) -> Result<Vec<MedicalRecordView>, DomainError> {
    require_ordered(start, end)?;
    views.find_by_hospital_in_range(hospital_id, start, end).await
}

/// Lists the reservations of a treatment product inside `[start, end]`,
/// earliest first.
///
/// # Errors
///
/// Returns `DomainError::InvalidCommand` if `start` is after `end`.
pub async fn list_by_treatment_product_in_range(
    treatment_product_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    views: &dyn ViewRepository,
) -> Result<Vec<MedicalRecordView>, DomainError> {
    require_ordered(start, end)?;
    views
        .find_by_treatment_product_in_range(treatment_product_id, start, end)
        .await
}

/// Lists a patient's reservations, newest first. When `hospital_id` is
/// given, only that hospital's.
///
/// # Errors
///
/// Propagates repository failures.
pub async fn list_by_user(
    user_id: &str,
    hospital_id: Option<&str>,
    views: &dyn ViewRepository,
) -> Result<Vec<MedicalRecordView>, DomainError> {
    match hospital_id {
        Some(hospital_id) => views.find_by_user_and_hospital(user_id, hospital_id).await,
        None => views.find_by_user(user_id).await,
    }
}

/// Rehydrates a record's aggregate state.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the stream has no facts.
pub async fn get_record_state(
    record_id: &str,
    processor: &CommandProcessor,
) -> Result<RecordStateView, DomainError> {
    let snapshot = processor.rehydrate(record_id).await?;
    if !snapshot.exists() {
        return Err(DomainError::not_found("medical_record", record_id));
    }
    Ok(RecordStateView {
        record_id: snapshot.record_id,
        version: snapshot.version,
        state: snapshot.state,
    })
}

/// Returns a record's audit trail in version order.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the stream has no facts.
pub async fn get_record_events(
    record_id: &str,
    processor: &CommandProcessor,
) -> Result<Vec<RecordEventView>, DomainError> {
    let events = processor.events_by_record_id(record_id).await?;
    if events.is_empty() {
        return Err(DomainError::not_found("medical_record", record_id));
    }
    events.iter().map(RecordEventView::from_event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use medops_test_support::{FailingViewRepository, InMemoryViewRepository};

    fn row(record_id: &str, user_id: &str, hospital_id: &str, start_hour: u32) -> MedicalRecordView {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, start_hour, 0, 0).unwrap();
        MedicalRecordView {
            record_id: record_id.to_owned(),
            user_id: user_id.to_owned(),
            user_name: "Park Jisoo".to_owned(),
            hospital_id: hospital_id.to_owned(),
            hospital_name: "Seoul Central".to_owned(),
            doctor_id: None,
            doctor_name: None,
            note: String::new(),
            status: RecordStatus::Pending,
            start_time: start,
            end_time: start + Duration::minutes(30),
            treatment_product_id: "P1".to_owned(),
            treatment_product_name: "Laser Toning".to_owned(),
            user_memo: String::new(),
            version: 1,
        }
    }

    async fn seeded() -> InMemoryViewRepository {
        let views = InMemoryViewRepository::new();
        for view in [
            row("r-11", "U1", "H1", 11),
            row("r-09", "U1", "H1", 9),
            row("r-14", "U1", "H2", 14),
            row("r-10", "U2", "H1", 10),
        ] {
            views.save(&view).await.unwrap();
        }
        views
    }

    fn ids(rows: &[MedicalRecordView]) -> Vec<&str> {
        rows.iter().map(|r| r.record_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_get_medical_record_view_returns_row() {
        let views = seeded().await;

        let view = get_medical_record_view("r-10", &views).await.unwrap();

        assert_eq!(view.user_id, "U2");
    }

    #[tokio::test]
    async fn test_get_medical_record_view_missing_is_not_found() {
        let views = InMemoryViewRepository::new();

        let result = get_medical_record_view("record-404", &views).await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                kind: "medical_record",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_hospital_range_is_inclusive_and_ascending() {
        // Arrange
        let views = seeded().await;
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 15, 11, 30, 0).unwrap();

        // Act
        let rows = list_by_hospital_in_range("H1", start, end, &views).await.unwrap();

        // Assert
        assert_eq!(ids(&rows), vec!["r-09", "r-10", "r-11"]);
    }

    #[tokio::test]
    async fn test_hospital_range_excludes_reservation_ending_after_range() {
        let views = seeded().await;
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 15, 11, 15, 0).unwrap();

        let rows = list_by_hospital_in_range("H1", start, end, &views).await.unwrap();

        assert_eq!(ids(&rows), vec!["r-09", "r-10"]);
    }

    #[tokio::test]
    async fn test_inverted_range_is_invalid() {
        let views = seeded().await;
        let start = Utc.with_ymd_and_hms(2026, 1, 16, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();

        let result = list_by_treatment_product_in_range("P1", start, end, &views).await;

        assert!(matches!(result, Err(DomainError::InvalidCommand(_))));
    }

    #[tokio::test]
    async fn test_list_by_user_is_newest_first() {
        let views = seeded().await;

        let all = list_by_user("U1", None, &views).await.unwrap();
        let at_h1 = list_by_user("U1", Some("H1"), &views).await.unwrap();

        assert_eq!(ids(&all), vec!["r-14", "r-11", "r-09"]);
        assert_eq!(ids(&at_h1), vec!["r-11", "r-09"]);
    }

    #[tokio::test]
    async fn test_repository_failure_propagates() {
        let result = list_by_user("U1", None, &FailingViewRepository).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
