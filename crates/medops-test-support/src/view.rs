//! Test view repositories.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medops_core::error::DomainError;
use medops_core::view::{MedicalRecordView, ViewRepository};

/// View rows held in memory, with the same filters, ordering and
/// latest-version-wins saves as the PostgreSQL repository.
#[derive(Debug, Default)]
pub struct InMemoryViewRepository {
    rows: Mutex<HashMap<String, MedicalRecordView>>,
    saves: AtomicU32,
}

impl InMemoryViewRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row for `record_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, record_id: &str) -> Option<MedicalRecordView> {
        self.rows.lock().unwrap().get(record_id).cloned()
    }

    /// Number of `save` calls.
    #[must_use]
    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }

    fn select(
        &self,
        keep: impl Fn(&MedicalRecordView) -> bool,
        newest_first: bool,
    ) -> Vec<MedicalRecordView> {
        let mut rows: Vec<MedicalRecordView> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| keep(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        if newest_first {
            rows.reverse();
        }
        rows
    }
}

#[async_trait]
impl ViewRepository for InMemoryViewRepository {
    async fn find_by_id(&self, record_id: &str) -> Result<Option<MedicalRecordView>, DomainError> {
        Ok(self.get(record_id))
    }

    async fn save(&self, view: &MedicalRecordView) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        let stale = rows
            .get(&view.record_id)
            .is_some_and(|row| row.version >= view.version);
        if !stale {
            rows.insert(view.record_id.clone(), view.clone());
        }
        drop(rows);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_by_hospital_in_range(
        &self,
        hospital_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        Ok(self.select(
            |row| row.hospital_id == hospital_id && row.start_time >= start && row.end_time <= end,
            false,
        ))
    }

    async fn find_by_treatment_product_in_range(
        &self,
        treatment_product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        Ok(self.select(
            |row| {
                row.treatment_product_id == treatment_product_id
                    && row.start_time >= start
                    && row.end_time <= end
            },
            false,
        ))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<MedicalRecordView>, DomainError> {
        Ok(self.select(|row| row.user_id == user_id, true))
    }

    async fn find_by_user_and_hospital(
        &self,
        user_id: &str,
        hospital_id: &str,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        Ok(self.select(
            |row| row.user_id == user_id && row.hospital_id == hospital_id,
            true,
        ))
    }
}

/// A view repository whose every call fails.
#[derive(Debug)]
pub struct FailingViewRepository;

fn unavailable() -> DomainError {
    DomainError::Infrastructure("view store unavailable".into())
}

#[async_trait]
impl ViewRepository for FailingViewRepository {
    async fn find_by_id(&self, _record_id: &str) -> Result<Option<MedicalRecordView>, DomainError> {
        Err(unavailable())
    }

    async fn save(&self, _view: &MedicalRecordView) -> Result<(), DomainError> {
        Err(unavailable())
    }

    async fn find_by_hospital_in_range(
        &self,
        _hospital_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        Err(unavailable())
    }

    async fn find_by_treatment_product_in_range(
        &self,
        _treatment_product_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        Err(unavailable())
    }

    async fn find_by_user(&self, _user_id: &str) -> Result<Vec<MedicalRecordView>, DomainError> {
        Err(unavailable())
    }

    async fn find_by_user_and_hospital(
        &self,
        _user_id: &str,
        _hospital_id: &str,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        Err(unavailable())
    }
}
