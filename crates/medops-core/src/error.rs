//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity (stream, doctor, admin, view row, ...) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What kind of entity was looked up.
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// The command violates a lifecycle or input rule. Nothing was appended.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A stored fact or snapshot could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Optimistic concurrency conflict on append.
    #[error(
        "concurrency conflict on record {record_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The stream that had the conflict.
        record_id: String,
        /// The version the command was decided against.
        expected: i64,
        /// The version found in the store.
        actual: i64,
    },

    /// A bounded operation did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns `true` when retrying from a fresh rehydrate may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
