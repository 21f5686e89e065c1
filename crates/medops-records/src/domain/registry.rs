//! Tag-to-owner lookup tables for executors and handlers.
//!
//! Both registries are built once at startup and refuse to exist unless
//! every kind has exactly one owner.

use std::collections::HashMap;
use std::sync::Arc;

use medops_core::error::DomainError;
use thiserror::Error;

use super::aggregates::{MedicalRecord, MedicalRecordSnapshot};
use super::commands::CommandType;
use super::events::{EventType, RecordEvent, RecordEventKind};
use super::executors::CommandExecutor;
use super::handlers::EventHandler;

/// Wiring errors detected while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A kind has no owner.
    #[error("no {registry} registered for {kind}")]
    Missing {
        /// Which registry was being built.
        registry: &'static str,
        /// The kind without an owner.
        kind: &'static str,
    },

    /// A kind has more than one owner.
    #[error("more than one {registry} registered for {kind}")]
    Duplicate {
        /// Which registry was being built.
        registry: &'static str,
        /// The kind with several owners.
        kind: &'static str,
    },
}

/// Command kind to executor.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<CommandType, Arc<dyn CommandExecutor>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExecutorRegistry {
    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` unless every [`CommandType`] has exactly one
    /// executor.
    pub fn new(executors: Vec<Arc<dyn CommandExecutor>>) -> Result<Self, RegistryError> {
        let mut by_kind = HashMap::new();
        for executor in executors {
            let kind = executor.command_type();
            if by_kind.insert(kind, executor).is_some() {
                return Err(RegistryError::Duplicate {
                    registry: "command executor",
                    kind: kind.as_str(),
                });
            }
        }
        if let Some(missing) = CommandType::ALL.iter().find(|k| !by_kind.contains_key(k)) {
            return Err(RegistryError::Missing {
                registry: "command executor",
                kind: missing.as_str(),
            });
        }
        Ok(Self {
            executors: by_kind,
        })
    }

    /// Returns the sole executor for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if no executor is registered,
    /// which construction rules out.
    pub fn get(&self, kind: CommandType) -> Result<&dyn CommandExecutor, DomainError> {
        self.executors
            .get(&kind)
            .map(|owner| &**owner)
            .ok_or_else(|| DomainError::Infrastructure(format!("no executor for {kind}")))
    }
}

/// Fact kind to handler, plus the folding helpers built on it.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` unless every [`EventType`] has exactly one
    /// handler.
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Result<Self, RegistryError> {
        let mut by_kind = HashMap::new();
        for handler in handlers {
            let kind = handler.event_type();
            if by_kind.insert(kind, handler).is_some() {
                return Err(RegistryError::Duplicate {
                    registry: "event handler",
                    kind: kind.as_str(),
                });
            }
        }
        if let Some(missing) = EventType::ALL.iter().find(|k| !by_kind.contains_key(k)) {
            return Err(RegistryError::Missing {
                registry: "event handler",
                kind: missing.as_str(),
            });
        }
        Ok(Self { handlers: by_kind })
    }

    /// Returns the sole handler for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if no handler is registered,
    /// which construction rules out.
    pub fn get(&self, kind: EventType) -> Result<&dyn EventHandler, DomainError> {
        self.handlers
            .get(&kind)
            .map(|owner| &**owner)
            .ok_or_else(|| DomainError::Infrastructure(format!("no handler for {kind}")))
    }

    /// Folds one fact kind onto `state`.
    ///
    /// # Errors
    ///
    /// Propagates handler errors.
    pub fn fold(
        &self,
        state: MedicalRecord,
        event: &RecordEventKind,
    ) -> Result<MedicalRecord, DomainError> {
        self.get(event.event_type())?.apply(state, event)
    }

    /// Folds a versioned fact onto a snapshot, advancing its version by one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` when the fact does not carry
    /// the next version (a gap or duplicate in the stream), and propagates
    /// handler errors.
    pub fn fold_snapshot(
        &self,
        snapshot: MedicalRecordSnapshot,
        event: &RecordEvent,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<MedicalRecordSnapshot, DomainError> {
        let next = snapshot.version + 1;
        if event.metadata.version != next {
            return Err(DomainError::Deserialization(format!(
                "stream {} out of order: expected version {next}, found {}",
                snapshot.record_id, event.metadata.version
            )));
        }
        let state = self.fold(snapshot.state, &event.kind)?;
        Ok(MedicalRecordSnapshot {
            snapshot_id: snapshot.snapshot_id,
            record_id: snapshot.record_id,
            created_at: now,
            version: next,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::executors::{CreateReservationExecutor, UpdateNoteExecutor, default_executors};
    use crate::domain::handlers::{NoteUpdatedHandler, default_handlers};
    use medops_core::directory::Directory;
    use medops_test_support::StaticDirectory;

    fn directory() -> Arc<dyn Directory> {
        Arc::new(StaticDirectory::new())
    }

    #[test]
    fn test_executor_registry_accepts_complete_set() {
        let registry = ExecutorRegistry::new(default_executors(&directory())).unwrap();

        for kind in CommandType::ALL {
            assert_eq!(registry.get(kind).unwrap().command_type(), kind);
        }
    }

    #[test]
    fn test_executor_registry_rejects_missing_kind() {
        let executors: Vec<Arc<dyn CommandExecutor>> =
            vec![Arc::new(CreateReservationExecutor), Arc::new(UpdateNoteExecutor)];

        let err = ExecutorRegistry::new(executors).unwrap_err();

        assert_eq!(
            err,
            RegistryError::Missing {
                registry: "command executor",
                kind: CommandType::Confirm.as_str(),
            }
        );
    }

    #[test]
    fn test_executor_registry_rejects_duplicate_kind() {
        let mut executors = default_executors(&directory());
        executors.push(Arc::new(UpdateNoteExecutor));

        let err = ExecutorRegistry::new(executors).unwrap_err();

        assert_eq!(
            err,
            RegistryError::Duplicate {
                registry: "command executor",
                kind: CommandType::UpdateNote.as_str(),
            }
        );
    }

    #[test]
    fn test_handler_registry_rejects_duplicate_kind() {
        let mut handlers = default_handlers();
        handlers.push(Arc::new(NoteUpdatedHandler));

        let err = HandlerRegistry::new(handlers).unwrap_err();

        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }

    #[test]
    fn test_handler_registry_rejects_missing_kind() {
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(NoteUpdatedHandler)];

        let err = HandlerRegistry::new(handlers).unwrap_err();

        assert_eq!(
            err.to_string(),
            "no event handler registered for medical_record.reservation_created"
        );
    }
}
