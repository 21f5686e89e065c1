//! Folders: pure state transitions, one per fact kind.

use std::sync::Arc;

use medops_core::error::DomainError;
use medops_core::status::RecordStatus;

use super::aggregates::{MedicalRecord, Reservation};
use super::events::{EventType, RecordEventKind};

/// Folds one fact kind onto aggregate state. No I/O, deterministic.
pub trait EventHandler: Send + Sync {
    /// The fact kind this handler owns.
    fn event_type(&self) -> EventType;

    /// Returns the state after `event`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if handed a kind it does not own.
    fn apply(&self, state: MedicalRecord, event: &RecordEventKind)
    -> Result<MedicalRecord, DomainError>;
}

fn mismatch(owner: EventType, got: &RecordEventKind) -> DomainError {
    DomainError::Infrastructure(format!(
        "{owner} handler received {}",
        got.event_type()
    ))
}

/// Sets the booking fields; a new reservation always starts pending.
#[derive(Debug, Default)]
pub struct ReservationCreatedHandler;

impl EventHandler for ReservationCreatedHandler {
    fn event_type(&self) -> EventType {
        EventType::ReservationCreated
    }

    fn apply(
        &self,
        state: MedicalRecord,
        event: &RecordEventKind,
    ) -> Result<MedicalRecord, DomainError> {
        let RecordEventKind::ReservationCreated(created) = event else {
            return Err(mismatch(self.event_type(), event));
        };
        Ok(MedicalRecord {
            user_id: created.user_id.clone(),
            hospital_id: created.hospital_id.clone(),
            note: created.note.clone(),
            status: RecordStatus::Pending,
            reservation: Reservation {
                treatment_product_id: Some(created.treatment_product_id.clone()),
                start_time: Some(created.start_time),
                end_time: Some(created.end_time),
                user_memo: created.user_memo.clone(),
            },
            ..state
        })
    }
}

/// Moves the record to a fixed status. One instance per status fact kind.
#[derive(Debug)]
pub struct StatusHandler {
    event_type: EventType,
    status: RecordStatus,
}

impl StatusHandler {
    /// Handler for `Confirmed` facts.
    #[must_use]
    pub fn confirmed() -> Self {
        Self {
            event_type: EventType::Confirmed,
            status: RecordStatus::Reserved,
        }
    }

    /// Handler for `Pending` facts.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            event_type: EventType::Pending,
            status: RecordStatus::Pending,
        }
    }

    /// Handler for `Canceled` facts.
    #[must_use]
    pub fn canceled() -> Self {
        Self {
            event_type: EventType::Canceled,
            status: RecordStatus::Canceled,
        }
    }

    /// Handler for `Completed` facts.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            event_type: EventType::Completed,
            status: RecordStatus::Completed,
        }
    }
}

impl EventHandler for StatusHandler {
    fn event_type(&self) -> EventType {
        self.event_type
    }

    fn apply(
        &self,
        state: MedicalRecord,
        event: &RecordEventKind,
    ) -> Result<MedicalRecord, DomainError> {
        if event.event_type() != self.event_type {
            return Err(mismatch(self.event_type, event));
        }
        Ok(MedicalRecord {
            status: self.status,
            ..state
        })
    }
}

/// Records the assigned doctor. Status is untouched.
#[derive(Debug, Default)]
pub struct DoctorAssignedHandler;

impl EventHandler for DoctorAssignedHandler {
    fn event_type(&self) -> EventType {
        EventType::DoctorAssigned
    }

    fn apply(
        &self,
        state: MedicalRecord,
        event: &RecordEventKind,
    ) -> Result<MedicalRecord, DomainError> {
        let RecordEventKind::DoctorAssigned(assigned) = event else {
            return Err(mismatch(self.event_type(), event));
        };
        Ok(MedicalRecord {
            doctor: Some(assigned.doctor_id.clone()),
            ..state
        })
    }
}

/// Replaces the staff note. Status is untouched.
#[derive(Debug, Default)]
pub struct NoteUpdatedHandler;

impl EventHandler for NoteUpdatedHandler {
    fn event_type(&self) -> EventType {
        EventType::NoteUpdated
    }

    fn apply(
        &self,
        state: MedicalRecord,
        event: &RecordEventKind,
    ) -> Result<MedicalRecord, DomainError> {
        let RecordEventKind::NoteUpdated(updated) = event else {
            return Err(mismatch(self.event_type(), event));
        };
        Ok(MedicalRecord {
            note: updated.note.clone(),
            ..state
        })
    }
}

/// One handler per fact kind, ready for [`super::registry::HandlerRegistry`].
#[must_use]
pub fn default_handlers() -> Vec<Arc<dyn EventHandler>> {
    vec![
        Arc::new(ReservationCreatedHandler),
        Arc::new(StatusHandler::confirmed()),
        Arc::new(StatusHandler::pending()),
        Arc::new(StatusHandler::canceled()),
        Arc::new(StatusHandler::completed()),
        Arc::new(DoctorAssignedHandler),
        Arc::new(NoteUpdatedHandler),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{DoctorAssigned, NoteUpdated, ReservationCreated, StatusChanged};
    use chrono::{TimeZone, Utc};

    fn created() -> RecordEventKind {
        RecordEventKind::ReservationCreated(ReservationCreated {
            user_id: "U1".to_owned(),
            hospital_id: "H1".to_owned(),
            treatment_product_id: "P1".to_owned(),
            start_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap(),
            user_memo: "first visit".to_owned(),
            note: String::new(),
        })
    }

    fn status_changed() -> StatusChanged {
        StatusChanged {
            admin_id: "A1".to_owned(),
            admin_name: "Lee".to_owned(),
        }
    }

    #[test]
    fn test_reservation_created_sets_booking_and_pending() {
        // Arrange
        let mut seed = MedicalRecord::seed("record-1");
        seed.status = RecordStatus::Reserved;

        // Act
        let state = ReservationCreatedHandler.apply(seed, &created()).unwrap();

        // Assert
        assert_eq!(state.id, "record-1");
        assert_eq!(state.user_id, "U1");
        assert_eq!(state.hospital_id, "H1");
        assert_eq!(state.status, RecordStatus::Pending);
        assert_eq!(state.reservation.treatment_product_id.as_deref(), Some("P1"));
        assert_eq!(state.reservation.user_memo, "first visit");
    }

    #[test]
    fn test_status_handlers_set_their_status() {
        let cases = [
            (StatusHandler::confirmed(), RecordEventKind::Confirmed(status_changed()), RecordStatus::Reserved),
            (StatusHandler::pending(), RecordEventKind::Pending(status_changed()), RecordStatus::Pending),
            (StatusHandler::canceled(), RecordEventKind::Canceled(status_changed()), RecordStatus::Canceled),
            (StatusHandler::completed(), RecordEventKind::Completed(status_changed()), RecordStatus::Completed),
        ];

        for (handler, event, expected) in cases {
            let state = handler.apply(MedicalRecord::seed("record-1"), &event).unwrap();
            assert_eq!(state.status, expected, "{}", handler.event_type());
        }
    }

    #[test]
    fn test_doctor_assigned_sets_doctor_and_keeps_status() {
        let mut before = MedicalRecord::seed("record-1");
        before.status = RecordStatus::Reserved;
        let event = RecordEventKind::DoctorAssigned(DoctorAssigned {
            doctor_id: "D1".to_owned(),
            doctor_name: "Dr. Kim".to_owned(),
            admin_id: "A1".to_owned(),
            admin_name: "Lee".to_owned(),
        });

        let state = DoctorAssignedHandler.apply(before, &event).unwrap();

        assert_eq!(state.doctor.as_deref(), Some("D1"));
        assert_eq!(state.status, RecordStatus::Reserved);
    }

    #[test]
    fn test_note_updated_replaces_note_only() {
        let before = ReservationCreatedHandler
            .apply(MedicalRecord::seed("record-1"), &created())
            .unwrap();
        let event = RecordEventKind::NoteUpdated(NoteUpdated {
            note: "ok".to_owned(),
        });

        let state = NoteUpdatedHandler.apply(before.clone(), &event).unwrap();

        assert_eq!(state.note, "ok");
        assert_eq!(state.status, before.status);
        assert_eq!(state.reservation, before.reservation);
    }

    #[test]
    fn test_handler_rejects_foreign_kind() {
        let result = StatusHandler::confirmed()
            .apply(MedicalRecord::seed("record-1"), &created());

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[test]
    fn test_default_handlers_cover_every_event_type_once() {
        let handlers = default_handlers();
        for kind in EventType::ALL {
            let owners = handlers.iter().filter(|h| h.event_type() == kind).count();
            assert_eq!(owners, 1, "{kind}");
        }
    }
}
