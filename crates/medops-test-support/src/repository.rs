//! Test stores: in-memory and failing `EventStore` / `SnapshotStore`
//! implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medops_core::error::DomainError;
use medops_core::repository::{
    EventStore, SnapshotStore, StoredEvent, StoredSnapshot, check_contiguous,
};

/// An append-only fact log held in memory, with the same optimistic
/// concurrency rule as the PostgreSQL store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: Mutex<HashMap<String, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every fact of `record_id` in version order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn events(&self, record_id: &str) -> Vec<StoredEvent> {
        self.streams
            .lock()
            .unwrap()
            .get(record_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        record_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        check_contiguous(record_id, expected_version, events)?;
        let mut streams = self.streams.lock().unwrap();
        let stream = streams.entry(record_id.to_owned()).or_default();
        let actual = stream.last().map_or(0, |e| e.version);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                record_id: record_id.to_owned(),
                expected: expected_version,
                actual,
            });
        }
        stream.extend_from_slice(events);
        Ok(())
    }

    async fn query_from(
        &self,
        record_id: &str,
        min_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .events(record_id)
            .into_iter()
            .filter(|e| e.version >= min_version)
            .collect())
    }
}

/// Wraps an [`InMemoryEventStore`] and rejects the first `conflicts` appends
/// with `ConcurrencyConflict`, as if another writer got there first.
#[derive(Debug)]
pub struct ConflictingEventStore {
    inner: Arc<InMemoryEventStore>,
    remaining: AtomicU32,
    attempts: AtomicU32,
}

impl ConflictingEventStore {
    /// Creates the wrapper.
    #[must_use]
    pub fn new(inner: Arc<InMemoryEventStore>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
        }
    }

    /// Number of `append` calls received, rejected ones included.
    #[must_use]
    pub fn append_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for ConflictingEventStore {
    async fn append(
        &self,
        record_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let conflicted = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(DomainError::ConcurrencyConflict {
                record_id: record_id.to_owned(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.append(record_id, expected_version, events).await
    }

    async fn query_from(
        &self,
        record_id: &str,
        min_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.query_from(record_id, min_version).await
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn append(
        &self,
        _record_id: &str,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn query_from(
        &self,
        _record_id: &str,
        _min_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Latest snapshot per stream, held in memory. Saving replaces the row.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    latest: Mutex<HashMap<String, StoredSnapshot>>,
    saves: AtomicU32,
}

impl InMemorySnapshotStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the snapshot currently held for `record_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn latest(&self, record_id: &str) -> Option<StoredSnapshot> {
        self.latest.lock().unwrap().get(record_id).cloned()
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Seeds a snapshot directly, bypassing the save counter.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, snapshot: StoredSnapshot) {
        self.latest
            .lock()
            .unwrap()
            .insert(snapshot.record_id.clone(), snapshot);
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load_latest(&self, record_id: &str) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self.latest(record_id))
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        self.insert(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A snapshot store that never has a snapshot and fails every save.
#[derive(Debug)]
pub struct FailingSnapshotStore;

#[async_trait]
impl SnapshotStore for FailingSnapshotStore {
    async fn load_latest(&self, _record_id: &str) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("disk full".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medops_core::status::RecordStatus;
    use uuid::Uuid;

    fn event(version: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            record_id: "record-1".to_owned(),
            event_type: "medical_record.note_updated".to_owned(),
            hospital_id: "H1".to_owned(),
            user_id: "U1".to_owned(),
            version,
            status: RecordStatus::Pending,
            payload: serde_json::json!({ "note": "ok" }),
            correlation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_with_stale_expected_version_conflicts() {
        // Arrange
        let store = InMemoryEventStore::new();
        store.append("record-1", 0, &[event(1)]).await.unwrap();

        // Act
        let result = store.append("record-1", 0, &[event(1)]).await;

        // Assert
        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert_eq!(store.events("record-1").len(), 1);
    }

    #[tokio::test]
    async fn test_query_from_returns_versions_at_or_above_minimum() {
        let store = InMemoryEventStore::new();
        store
            .append("record-1", 0, &[event(1), event(2), event(3)])
            .await
            .unwrap();

        let events = store.query_from("record-1", 2).await.unwrap();

        let versions: Vec<i64> = events.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_conflicting_store_rejects_then_delegates() {
        let inner = Arc::new(InMemoryEventStore::new());
        let store = ConflictingEventStore::new(Arc::clone(&inner), 1);

        assert!(store.append("record-1", 0, &[event(1)]).await.is_err());
        assert!(store.append("record-1", 0, &[event(1)]).await.is_ok());

        assert_eq!(store.append_attempts(), 2);
        assert_eq!(inner.events("record-1").len(), 1);
    }
}
