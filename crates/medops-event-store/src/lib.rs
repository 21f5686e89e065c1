//! `PostgreSQL` adapters for every MedOps storage and lookup port.

pub mod pg_directory;
pub mod pg_event_store;
pub mod pg_snapshot_store;
pub mod pg_view_repository;
pub mod schema;

use medops_core::error::DomainError;

/// Maps a driver error to `DomainError::Infrastructure`.
pub(crate) fn infra(error: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {error}"))
}
