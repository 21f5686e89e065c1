//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::status::RecordStatus;

/// Metadata attached to every fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique fact identifier.
    pub event_id: Uuid,
    /// Type tag for deserialization routing.
    pub event_type: String,
    /// Stream this fact belongs to.
    pub record_id: String,
    /// Hospital that owns the reservation.
    pub hospital_id: String,
    /// Patient the reservation belongs to.
    pub user_id: String,
    /// 1-based position in the stream. Strictly increasing, no gaps.
    pub version: i64,
    /// Aggregate status after this fact is folded.
    pub status: RecordStatus,
    /// Correlation ID of the command that produced this fact.
    pub correlation_id: Uuid,
    /// Timestamp of fact creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all facts implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type tag (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the kind-specific fields to a generic JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be encoded.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;

    /// Returns the metadata for this fact.
    fn metadata(&self) -> &EventMetadata;
}
