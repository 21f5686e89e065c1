//! Keeps the `MedicalRecordView` read model in step with the fact log.
//!
//! Every reaction reads the current row, applies its deltas, and writes the
//! whole row back stamped with the fact's version. A fact at or below the
//! row's version is already reflected and is skipped, so replays and late
//! deliveries never move the row backwards.

use std::sync::Arc;

use async_trait::async_trait;
use medops_core::directory::{Directory, require_name};
use medops_core::error::DomainError;
use medops_core::status::RecordStatus;
use medops_core::view::{MedicalRecordView, ViewRepository};
use tracing::{debug, warn};

use super::event_bus::EventSubscriber;
use crate::domain::events::{RecordEvent, RecordEventKind};

/// Projects facts into view rows.
pub struct ViewProjector {
    views: Arc<dyn ViewRepository>,
    directory: Arc<dyn Directory>,
}

impl std::fmt::Debug for ViewProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewProjector").finish_non_exhaustive()
    }
}

impl ViewProjector {
    /// Creates the projector.
    #[must_use]
    pub fn new(views: Arc<dyn ViewRepository>, directory: Arc<dyn Directory>) -> Self {
        Self { views, directory }
    }

    /// Applies one fact and returns the row written, or `None` when the fact
    /// targets a row that does not exist yet or is already reflected.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` when a referenced user, hospital,
    /// treatment product, or doctor cannot be resolved, and propagates
    /// repository failures.
    pub async fn project(&self, event: &RecordEvent) -> Result<Option<MedicalRecordView>, DomainError> {
        let record_id = &event.metadata.record_id;
        let version = event.metadata.version;
        let current = self.views.find_by_id(record_id).await?;
        if let Some(row) = current.as_ref().filter(|row| row.version >= version) {
            debug!(
                record_id = %record_id,
                version,
                view_version = row.version,
                "fact already reflected in view row, skipping"
            );
            return Ok(None);
        }

        let view = match &event.kind {
            RecordEventKind::ReservationCreated(created) => {
                let user_name = require_name(
                    "user",
                    &created.user_id,
                    self.directory.user_name(&created.user_id).await,
                )?;
                let hospital_name = require_name(
                    "hospital",
                    &created.hospital_id,
                    self.directory.hospital_name(&created.hospital_id).await,
                )?;
                let treatment_product_name = require_name(
                    "treatment_product",
                    &created.treatment_product_id,
                    self.directory
                        .treatment_product_name(&created.treatment_product_id)
                        .await,
                )?;
                Some(MedicalRecordView {
                    record_id: record_id.clone(),
                    user_id: created.user_id.clone(),
                    user_name,
                    hospital_id: created.hospital_id.clone(),
                    hospital_name,
                    doctor_id: None,
                    doctor_name: None,
                    note: created.note.clone(),
                    status: RecordStatus::Pending,
                    start_time: created.start_time,
                    end_time: created.end_time,
                    treatment_product_id: created.treatment_product_id.clone(),
                    treatment_product_name,
                    user_memo: created.user_memo.clone(),
                    version,
                })
            }
            RecordEventKind::Confirmed(_) => with_status(event, current, RecordStatus::Reserved),
            RecordEventKind::Pending(_) => with_status(event, current, RecordStatus::Pending),
            RecordEventKind::Canceled(_) => with_status(event, current, RecordStatus::Canceled),
            RecordEventKind::Completed(_) => with_status(event, current, RecordStatus::Completed),
            RecordEventKind::DoctorAssigned(assigned) => {
                let doctor_name = require_name(
                    "doctor",
                    &assigned.doctor_id,
                    self.directory.doctor_name(&assigned.doctor_id).await,
                )?;
                with_row(event, current, |row| {
                    row.doctor_id = Some(assigned.doctor_id.clone());
                    row.doctor_name = Some(doctor_name);
                })
            }
            RecordEventKind::NoteUpdated(updated) => {
                with_row(event, current, |row| row.note.clone_from(&updated.note))
            }
        };

        let Some(view) = view else {
            return Ok(None);
        };
        self.views.save(&view).await?;
        debug!(
            record_id = %view.record_id,
            version,
            event_type = %event.kind.event_type(),
            "view row written"
        );
        Ok(Some(view))
    }
}

/// Applies `change` to the row `event` targets and stamps the fact's version.
fn with_row(
    event: &RecordEvent,
    current: Option<MedicalRecordView>,
    change: impl FnOnce(&mut MedicalRecordView),
) -> Option<MedicalRecordView> {
    let Some(mut row) = current else {
        warn!(
            record_id = %event.metadata.record_id,
            version = event.metadata.version,
            event_type = %event.kind.event_type(),
            "no view row for fact, skipping"
        );
        return None;
    };
    change(&mut row);
    row.version = event.metadata.version;
    Some(row)
}

fn with_status(
    event: &RecordEvent,
    current: Option<MedicalRecordView>,
    status: RecordStatus,
) -> Option<MedicalRecordView> {
    with_row(event, current, |row| row.status = status)
}

#[async_trait]
impl EventSubscriber for ViewProjector {
    fn name(&self) -> &'static str {
        "view_projector"
    }

    async fn on_event(&self, event: &RecordEvent) -> Result<(), DomainError> {
        self.project(event).await.map(|_| ())
    }
}
