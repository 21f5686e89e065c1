//! `PostgreSQL` implementation of the `EventStore` trait.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use medops_core::error::DomainError;
use medops_core::repository::{EventStore, StoredEvent, check_contiguous};
use medops_core::status::RecordStatus;

use crate::infra;

/// PostgreSQL-backed fact log.
///
/// Appends run in one transaction: the stream's current version is checked
/// against the caller's expectation, and `UNIQUE (record_id, version)`
/// catches writers that race past that check.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    record_id: String,
    event_type: String,
    hospital_id: String,
    user_id: String,
    version: i64,
    status: String,
    payload: serde_json::Value,
    correlation_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for StoredEvent {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: RecordStatus::from_str(&row.status)?,
            event_id: row.event_id,
            record_id: row.record_id,
            event_type: row.event_type,
            hospital_id: row.hospital_id,
            user_id: row.user_id,
            version: row.version,
            payload: row.payload,
            correlation_id: row.correlation_id,
            occurred_at: row.occurred_at,
        })
    }
}

fn conflict(record_id: &str, expected: i64, actual: i64) -> DomainError {
    DomainError::ConcurrencyConflict {
        record_id: record_id.to_owned(),
        expected,
        actual,
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        record_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        check_contiguous(record_id, expected_version, events)?;
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(infra)?;

        let actual: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM medical_record_events WHERE record_id = $1",
        )
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(infra)?;
        if actual != expected_version {
            return Err(conflict(record_id, expected_version, actual));
        }

        for event in events {
            sqlx::query(
                r"
                INSERT INTO medical_record_events
                    (event_id, record_id, event_type, hospital_id, user_id,
                     version, status, payload, correlation_id, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(event.event_id)
            .bind(&event.record_id)
            .bind(&event.event_type)
            .bind(&event.hospital_id)
            .bind(&event.user_id)
            .bind(event.version)
            .bind(event.status.as_str())
            .bind(&event.payload)
            .bind(event.correlation_id)
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    conflict(record_id, expected_version, event.version)
                }
                other => infra(other),
            })?;
        }

        tx.commit().await.map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                conflict(record_id, expected_version, expected_version + 1)
            }
            other => infra(other),
        })?;

        debug!(record_id, expected_version, count = events.len(), "facts appended");
        Ok(())
    }

    async fn query_from(
        &self,
        record_id: &str,
        min_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT event_id, record_id, event_type, hospital_id, user_id,
                   version, status, payload, correlation_id, occurred_at
            FROM medical_record_events
            WHERE record_id = $1 AND version >= $2
            ORDER BY version ASC
            ",
        )
        .bind(record_id)
        .bind(min_version)
        .fetch_all(&self.pool)
        .await
        .map_err(infra)?;

        rows.into_iter().map(StoredEvent::try_from).collect()
    }
}
