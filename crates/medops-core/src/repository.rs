//! Fact log and snapshot store abstractions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::status::RecordStatus;

/// Stored representation of a fact.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    /// Unique fact identifier.
    pub event_id: Uuid,
    /// Stream this fact belongs to.
    pub record_id: String,
    /// Event type tag for deserialization routing.
    pub event_type: String,
    /// Hospital that owns the reservation.
    pub hospital_id: String,
    /// Patient the reservation belongs to.
    pub user_id: String,
    /// Position within the stream, starting at 1.
    pub version: i64,
    /// Aggregate status after this fact, denormalized for status queries.
    pub status: RecordStatus,
    /// Kind-specific fields, kept generic for schema evolution.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Timestamp of fact creation.
    pub occurred_at: DateTime<Utc>,
}

/// Stored representation of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    /// Snapshot row identifier.
    pub snapshot_id: Uuid,
    /// Stream the snapshot summarizes.
    pub record_id: String,
    /// The stream version the state corresponds to.
    pub version: i64,
    /// Full aggregate state, serialized.
    pub state: serde_json::Value,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// Append-only, per-stream ordered fact log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append facts to a stream.
    ///
    /// `expected_version` is the stream version the facts were decided
    /// against; `events[i].version` must equal `expected_version + 1 + i`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` when the stream's current
    /// version is not `expected_version`, and `DomainError::Infrastructure`
    /// on storage failures. Nothing is appended on error.
    async fn append(
        &self,
        record_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;

    /// Load facts with `version >= min_version`, ascending.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failures.
    async fn query_from(
        &self,
        record_id: &str,
        min_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load the full history of a stream, ascending.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failures.
    async fn load_all(&self, record_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        self.query_from(record_id, 1).await
    }
}

/// Latest point-in-time aggregate state per stream.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the most recent snapshot for a stream, if any.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failures.
    async fn load_latest(&self, record_id: &str) -> Result<Option<StoredSnapshot>, DomainError>;

    /// Persist a snapshot, replacing any older one for the same stream.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on storage failures.
    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError>;
}

/// Checks that `events` continue the stream at `expected_version` without
/// gaps. Shared by store implementations before they write anything.
///
/// # Errors
///
/// Returns `DomainError::InvalidCommand` when the batch is mis-numbered or
/// targets another stream.
pub fn check_contiguous(
    record_id: &str,
    expected_version: i64,
    events: &[StoredEvent],
) -> Result<(), DomainError> {
    for (offset, event) in (1_i64..).zip(events) {
        if event.record_id != record_id {
            return Err(DomainError::InvalidCommand(format!(
                "fact {} belongs to stream {}, not {record_id}",
                event.event_id, event.record_id
            )));
        }
        if event.version != expected_version + offset {
            return Err(DomainError::InvalidCommand(format!(
                "fact {} has version {}, expected {}",
                event.event_id,
                event.version,
                expected_version + offset
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(record_id: &str, version: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            record_id: record_id.to_owned(),
            event_type: "medical_record.note_updated".to_owned(),
            hospital_id: "H1".to_owned(),
            user_id: "U1".to_owned(),
            version,
            status: RecordStatus::Pending,
            payload: serde_json::json!({}),
            correlation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_check_contiguous_accepts_consecutive_versions() {
        let events = vec![event("r", 3), event("r", 4)];
        assert!(check_contiguous("r", 2, &events).is_ok());
    }

    #[test]
    fn test_check_contiguous_rejects_gap() {
        let events = vec![event("r", 3), event("r", 5)];
        let err = check_contiguous("r", 2, &events).unwrap_err();
        assert!(matches!(err, DomainError::InvalidCommand(_)));
    }

    #[test]
    fn test_check_contiguous_rejects_foreign_stream() {
        let events = vec![event("other", 1)];
        assert!(check_contiguous("r", 0, &events).is_err());
    }
}
