//! `PostgreSQL` implementation of the `SnapshotStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use medops_core::error::DomainError;
use medops_core::repository::{SnapshotStore, StoredSnapshot};

use crate::infra;

/// One snapshot row per stream. Saving upserts, and an older version never
/// replaces a newer one.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    /// Creates a new `PgSnapshotStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    snapshot_id: Uuid,
    record_id: String,
    version: i64,
    state: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for StoredSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            snapshot_id: row.snapshot_id,
            record_id: row.record_id,
            version: row.version,
            state: row.state,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn load_latest(&self, record_id: &str) -> Result<Option<StoredSnapshot>, DomainError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r"
            SELECT snapshot_id, record_id, version, state, created_at
            FROM medical_record_snapshots
            WHERE record_id = $1
            ",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(infra)?;

        Ok(row.map(StoredSnapshot::from))
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO medical_record_snapshots
                (record_id, snapshot_id, version, state, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (record_id) DO UPDATE SET
                snapshot_id = EXCLUDED.snapshot_id,
                version = EXCLUDED.version,
                state = EXCLUDED.state,
                created_at = EXCLUDED.created_at
            WHERE medical_record_snapshots.version < EXCLUDED.version
            ",
        )
        .bind(&snapshot.record_id)
        .bind(snapshot.snapshot_id)
        .bind(snapshot.version)
        .bind(&snapshot.state)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(infra)?;
        Ok(())
    }
}
