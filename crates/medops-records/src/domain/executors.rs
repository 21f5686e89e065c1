//! Command executors: decision logic, one per command kind.
//!
//! An executor inspects the rehydrated state, may resolve display names
//! through the [`Directory`], and returns the facts the command produces.
//! Executors never write anything.

use std::sync::Arc;

use async_trait::async_trait;
use medops_core::directory::{Directory, require_name};
use medops_core::error::DomainError;

use super::aggregates::MedicalRecord;
use super::commands::{CommandType, RecordCommand, RecordCommandKind};
use super::events::{DoctorAssigned, NoteUpdated, RecordEventKind, ReservationCreated, StatusChanged};

/// Turns one command kind into facts.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// The command kind this executor owns.
    fn command_type(&self) -> CommandType;

    /// Decide which facts `command` produces against `state` at `version`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidCommand` for lifecycle violations,
    /// `DomainError::NotFound` for unknown streams or referenced entities,
    /// and propagates lookup failures.
    async fn produce(
        &self,
        state: &MedicalRecord,
        version: i64,
        command: &RecordCommand,
    ) -> Result<Vec<RecordEventKind>, DomainError>;
}

fn mismatch(owner: CommandType, command: &RecordCommand) -> DomainError {
    DomainError::Infrastructure(format!(
        "{owner} executor received {}",
        command.kind_type()
    ))
}

/// Only a stream with no facts may be created.
fn require_new_stream(version: i64) -> Result<(), DomainError> {
    if version > 0 {
        return Err(DomainError::InvalidCommand("already reserved".to_owned()));
    }
    Ok(())
}

/// Every command but creation needs an existing stream.
fn require_existing_stream(command: &RecordCommand, version: i64) -> Result<(), DomainError> {
    if version == 0 {
        return Err(DomainError::not_found("medical_record", &command.record_id));
    }
    Ok(())
}

/// Books a reservation on an empty stream.
#[derive(Debug, Default)]
pub struct CreateReservationExecutor;

#[async_trait]
impl CommandExecutor for CreateReservationExecutor {
    fn command_type(&self) -> CommandType {
        CommandType::ReservationCreate
    }

    async fn produce(
        &self,
        _state: &MedicalRecord,
        version: i64,
        command: &RecordCommand,
    ) -> Result<Vec<RecordEventKind>, DomainError> {
        let RecordCommandKind::ReservationCreate(create) = &command.kind else {
            return Err(mismatch(self.command_type(), command));
        };
        require_new_stream(version)?;
        if create.end_time <= create.start_time {
            return Err(DomainError::InvalidCommand(format!(
                "reservation must end after it starts ({} >= {})",
                create.start_time, create.end_time
            )));
        }

        Ok(vec![RecordEventKind::ReservationCreated(ReservationCreated {
            user_id: command.user_id.clone(),
            hospital_id: command.hospital_id.clone(),
            treatment_product_id: create.treatment_product_id.clone(),
            start_time: create.start_time,
            end_time: create.end_time,
            user_memo: create.user_memo.clone(),
            note: create.note.clone(),
        })])
    }
}

/// Admin-driven status change. One instance per status command kind.
pub struct StatusTransitionExecutor {
    command_type: CommandType,
    directory: Arc<dyn Directory>,
}

impl std::fmt::Debug for StatusTransitionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTransitionExecutor")
            .field("command_type", &self.command_type)
            .finish_non_exhaustive()
    }
}

impl StatusTransitionExecutor {
    /// Executor for `Confirm`.
    #[must_use]
    pub fn confirm(directory: Arc<dyn Directory>) -> Self {
        Self {
            command_type: CommandType::Confirm,
            directory,
        }
    }

    /// Executor for `Pending`.
    #[must_use]
    pub fn pending(directory: Arc<dyn Directory>) -> Self {
        Self {
            command_type: CommandType::Pending,
            directory,
        }
    }

    /// Executor for `Cancel`.
    #[must_use]
    pub fn cancel(directory: Arc<dyn Directory>) -> Self {
        Self {
            command_type: CommandType::Cancel,
            directory,
        }
    }

    /// Executor for `Complete`.
    #[must_use]
    pub fn complete(directory: Arc<dyn Directory>) -> Self {
        Self {
            command_type: CommandType::Complete,
            directory,
        }
    }
}

#[async_trait]
impl CommandExecutor for StatusTransitionExecutor {
    fn command_type(&self) -> CommandType {
        self.command_type
    }

    async fn produce(
        &self,
        state: &MedicalRecord,
        version: i64,
        command: &RecordCommand,
    ) -> Result<Vec<RecordEventKind>, DomainError> {
        let (RecordCommandKind::Confirm(action)
        | RecordCommandKind::Pending(action)
        | RecordCommandKind::Cancel(action)
        | RecordCommandKind::Complete(action)) = &command.kind
        else {
            return Err(mismatch(self.command_type, command));
        };
        if command.kind_type() != self.command_type {
            return Err(mismatch(self.command_type, command));
        }
        require_existing_stream(command, version)?;
        if state.status.is_terminal() {
            return Err(DomainError::InvalidCommand(format!(
                "record {} is already {}",
                command.record_id, state.status
            )));
        }

        let admin_name = require_name(
            "admin",
            &action.admin_id,
            self.directory.admin_name(&action.admin_id).await,
        )?;
        let changed = StatusChanged {
            admin_id: action.admin_id.clone(),
            admin_name,
        };

        let event = match self.command_type {
            CommandType::Confirm => RecordEventKind::Confirmed(changed),
            CommandType::Pending => RecordEventKind::Pending(changed),
            CommandType::Cancel => RecordEventKind::Canceled(changed),
            CommandType::Complete => RecordEventKind::Completed(changed),
            _ => return Err(mismatch(self.command_type, command)),
        };
        Ok(vec![event])
    }
}

/// Assigns a doctor, embedding the doctor's and admin's names.
pub struct AssignDoctorExecutor {
    directory: Arc<dyn Directory>,
}

impl AssignDoctorExecutor {
    /// Creates the executor.
    #[must_use]
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl CommandExecutor for AssignDoctorExecutor {
    fn command_type(&self) -> CommandType {
        CommandType::AssignDoctor
    }

    async fn produce(
        &self,
        _state: &MedicalRecord,
        version: i64,
        command: &RecordCommand,
    ) -> Result<Vec<RecordEventKind>, DomainError> {
        let RecordCommandKind::AssignDoctor(assign) = &command.kind else {
            return Err(mismatch(self.command_type(), command));
        };
        require_existing_stream(command, version)?;

        let admin_name = require_name(
            "admin",
            &assign.admin_id,
            self.directory.admin_name(&assign.admin_id).await,
        )?;
        let doctor_name = require_name(
            "doctor",
            &assign.doctor_id,
            self.directory.doctor_name(&assign.doctor_id).await,
        )?;

        Ok(vec![RecordEventKind::DoctorAssigned(DoctorAssigned {
            doctor_id: assign.doctor_id.clone(),
            doctor_name,
            admin_id: assign.admin_id.clone(),
            admin_name,
        })])
    }
}

/// Replaces the staff note.
#[derive(Debug, Default)]
pub struct UpdateNoteExecutor;

#[async_trait]
impl CommandExecutor for UpdateNoteExecutor {
    fn command_type(&self) -> CommandType {
        CommandType::UpdateNote
    }

    async fn produce(
        &self,
        _state: &MedicalRecord,
        version: i64,
        command: &RecordCommand,
    ) -> Result<Vec<RecordEventKind>, DomainError> {
        let RecordCommandKind::UpdateNote(update) = &command.kind else {
            return Err(mismatch(self.command_type(), command));
        };
        require_existing_stream(command, version)?;

        Ok(vec![RecordEventKind::NoteUpdated(NoteUpdated {
            note: update.note.clone(),
        })])
    }
}

/// One executor per command kind, ready for [`super::registry::ExecutorRegistry`].
#[must_use]
pub fn default_executors(directory: &Arc<dyn Directory>) -> Vec<Arc<dyn CommandExecutor>> {
    vec![
        Arc::new(CreateReservationExecutor),
        Arc::new(StatusTransitionExecutor::confirm(Arc::clone(directory))),
        Arc::new(StatusTransitionExecutor::pending(Arc::clone(directory))),
        Arc::new(StatusTransitionExecutor::cancel(Arc::clone(directory))),
        Arc::new(StatusTransitionExecutor::complete(Arc::clone(directory))),
        Arc::new(AssignDoctorExecutor::new(Arc::clone(directory))),
        Arc::new(UpdateNoteExecutor),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::{AdminAction, AssignDoctor, CreateReservation, UpdateNote};
    use chrono::{Duration, TimeZone, Utc};
    use medops_core::status::RecordStatus;
    use medops_test_support::StaticDirectory;

    fn directory() -> Arc<dyn Directory> {
        Arc::new(
            StaticDirectory::new()
                .with_admin("A1", "Lee")
                .with_doctor("D1", "Dr. Kim"),
        )
    }

    fn create_command() -> RecordCommand {
        let start = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        RecordCommand::new(
            "record-1",
            "U1",
            "H1",
            RecordCommandKind::ReservationCreate(CreateReservation {
                treatment_product_id: "P1".to_owned(),
                start_time: start,
                end_time: start + Duration::minutes(30),
                user_memo: "first visit".to_owned(),
                note: String::new(),
            }),
        )
    }

    fn admin_command(kind: fn(AdminAction) -> RecordCommandKind, admin_id: &str) -> RecordCommand {
        RecordCommand::new(
            "record-1",
            "U1",
            "H1",
            kind(AdminAction {
                admin_id: admin_id.to_owned(),
            }),
        )
    }

    #[tokio::test]
    async fn test_create_on_empty_stream_produces_reservation_created() {
        // Arrange
        let state = MedicalRecord::seed("record-1");

        // Act
        let events = CreateReservationExecutor
            .produce(&state, 0, &create_command())
            .await
            .unwrap();

        // Assert
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordEventKind::ReservationCreated(created) => {
                assert_eq!(created.user_id, "U1");
                assert_eq!(created.hospital_id, "H1");
                assert_eq!(created.treatment_product_id, "P1");
                assert_eq!(created.user_memo, "first visit");
            }
            other => panic!("expected ReservationCreated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_on_existing_stream_is_rejected() {
        let state = MedicalRecord::seed("record-1");

        let result = CreateReservationExecutor
            .produce(&state, 1, &create_command())
            .await;

        match result.unwrap_err() {
            DomainError::InvalidCommand(message) => assert_eq!(message, "already reserved"),
            other => panic!("expected InvalidCommand, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_with_inverted_window_is_rejected() {
        let mut command = create_command();
        if let RecordCommandKind::ReservationCreate(create) = &mut command.kind {
            create.end_time = create.start_time;
        }

        let result = CreateReservationExecutor
            .produce(&MedicalRecord::seed("record-1"), 0, &command)
            .await;

        assert!(matches!(result, Err(DomainError::InvalidCommand(_))));
    }

    #[tokio::test]
    async fn test_confirm_embeds_admin_name() {
        // Arrange
        let executor = StatusTransitionExecutor::confirm(directory());
        let state = MedicalRecord::seed("record-1");

        // Act
        let events = executor
            .produce(&state, 1, &admin_command(RecordCommandKind::Confirm, "A1"))
            .await
            .unwrap();

        // Assert
        assert_eq!(
            events,
            vec![RecordEventKind::Confirmed(StatusChanged {
                admin_id: "A1".to_owned(),
                admin_name: "Lee".to_owned(),
            })]
        );
    }

    #[tokio::test]
    async fn test_status_change_on_missing_stream_is_not_found() {
        let executor = StatusTransitionExecutor::cancel(directory());

        let result = executor
            .produce(
                &MedicalRecord::seed("record-1"),
                0,
                &admin_command(RecordCommandKind::Cancel, "A1"),
            )
            .await;

        match result.unwrap_err() {
            DomainError::NotFound { kind, id } => {
                assert_eq!(kind, "medical_record");
                assert_eq!(id, "record-1");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_change_on_terminal_record_is_rejected() {
        let executor = StatusTransitionExecutor::confirm(directory());
        let mut state = MedicalRecord::seed("record-1");
        state.status = RecordStatus::Canceled;

        let result = executor
            .produce(&state, 2, &admin_command(RecordCommandKind::Confirm, "A1"))
            .await;

        assert!(matches!(result, Err(DomainError::InvalidCommand(_))));
    }

    #[tokio::test]
    async fn test_unknown_admin_is_not_found() {
        let executor = StatusTransitionExecutor::complete(directory());

        let result = executor
            .produce(
                &MedicalRecord::seed("record-1"),
                1,
                &admin_command(RecordCommandKind::Complete, "A404"),
            )
            .await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound { kind: "admin", .. })
        ));
    }

    #[tokio::test]
    async fn test_status_executor_rejects_other_status_kind() {
        let executor = StatusTransitionExecutor::confirm(directory());

        let result = executor
            .produce(
                &MedicalRecord::seed("record-1"),
                1,
                &admin_command(RecordCommandKind::Cancel, "A1"),
            )
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_assign_doctor_resolves_both_names() {
        // Arrange
        let executor = AssignDoctorExecutor::new(directory());
        let command = RecordCommand::new(
            "record-1",
            "U1",
            "H1",
            RecordCommandKind::AssignDoctor(AssignDoctor {
                doctor_id: "D1".to_owned(),
                admin_id: "A1".to_owned(),
            }),
        );

        // Act
        let events = executor
            .produce(&MedicalRecord::seed("record-1"), 2, &command)
            .await
            .unwrap();

        // Assert
        match &events[0] {
            RecordEventKind::DoctorAssigned(assigned) => {
                assert_eq!(assigned.doctor_name, "Dr. Kim");
                assert_eq!(assigned.admin_name, "Lee");
            }
            other => panic!("expected DoctorAssigned, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_assign_unknown_doctor_is_not_found() {
        let executor = AssignDoctorExecutor::new(directory());
        let command = RecordCommand::new(
            "record-1",
            "U1",
            "H1",
            RecordCommandKind::AssignDoctor(AssignDoctor {
                doctor_id: "D404".to_owned(),
                admin_id: "A1".to_owned(),
            }),
        );

        let result = executor
            .produce(&MedicalRecord::seed("record-1"), 2, &command)
            .await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound { kind: "doctor", .. })
        ));
    }

    #[tokio::test]
    async fn test_update_note_is_allowed_on_terminal_record() {
        let mut state = MedicalRecord::seed("record-1");
        state.status = RecordStatus::Completed;
        let command = RecordCommand::new(
            "record-1",
            "U1",
            "H1",
            RecordCommandKind::UpdateNote(UpdateNote {
                note: "follow-up in two weeks".to_owned(),
            }),
        );

        let events = UpdateNoteExecutor.produce(&state, 5, &command).await.unwrap();

        assert_eq!(
            events,
            vec![RecordEventKind::NoteUpdated(NoteUpdated {
                note: "follow-up in two weeks".to_owned(),
            })]
        );
    }

    #[test]
    fn test_default_executors_cover_every_command_type_once() {
        let executors = default_executors(&directory());
        for kind in CommandType::ALL {
            let owners = executors.iter().filter(|e| e.command_type() == kind).count();
            assert_eq!(owners, 1, "{kind}");
        }
    }
}
