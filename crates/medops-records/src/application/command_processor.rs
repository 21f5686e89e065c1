//! The command processor: the single write path for medical record streams.
//!
//! One cycle is rehydrate, execute, persist, publish, fold, and snapshot.
//! Anything that fails before the append surfaces to the caller with nothing
//! written. Anything after the append is logged and the command still
//! succeeds, since its facts are already the system of record.
//!
//! Commands on the same stream run one at a time inside a process, from
//! rehydrate through publish, so subscribers see each stream's facts in
//! version order. Different streams proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use medops_core::clock::Clock;
use medops_core::error::DomainError;
use medops_core::event::EventMetadata;
use medops_core::repository::{EventStore, SnapshotStore, StoredEvent};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::event_bus::{EventBus, PublishReport};
use crate::domain::aggregates::MedicalRecordSnapshot;
use crate::domain::commands::RecordCommand;
use crate::domain::events::{RecordEvent, RecordEventKind};
use crate::domain::registry::{ExecutorRegistry, HandlerRegistry};

/// Tuning knobs for [`CommandProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// A snapshot is saved whenever the post-command version is a multiple
    /// of this.
    pub snapshot_interval: i64,
    /// Total tries of the rehydrate/execute/persist cycle when the append
    /// hits a concurrency conflict.
    pub max_attempts: u32,
    /// Upper bound on executor work, which includes directory lookups.
    pub lookup_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 5,
            max_attempts: 3,
            lookup_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a successfully handled command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The stream the command targeted.
    pub record_id: String,
    /// Stream version after the command.
    pub version: i64,
    /// The facts appended, in version order. Empty for a no-op.
    pub events: Vec<RecordEvent>,
    /// Whether a snapshot was written for this version.
    pub snapshot_saved: bool,
    /// Subscriber delivery counts.
    pub publish: PublishReport,
}

/// What a successful persist step hands to the post-commit steps.
struct Commit {
    before: MedicalRecordSnapshot,
    events: Vec<RecordEvent>,
}

/// One async gate per stream with a command in flight. Entries are dropped
/// once nobody holds or waits on them.
#[derive(Debug, Default)]
struct StreamGates {
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StreamGates {
    async fn acquire(&self, record_id: &str) -> StreamPermit<'_> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(gates.entry(record_id.to_owned()).or_default())
        };
        let guard = gate.lock_owned().await;
        StreamPermit {
            gates: self,
            record_id: record_id.to_owned(),
            guard: Some(guard),
        }
    }
}

struct StreamPermit<'a> {
    gates: &'a StreamGates,
    record_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for StreamPermit<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut gates = self
            .gates
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idle = gates
            .get(&self.record_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1);
        if idle {
            gates.remove(&self.record_id);
        }
    }
}

/// Orchestrates every command against the fact log.
pub struct CommandProcessor {
    event_store: Arc<dyn EventStore>,
    snapshot_store: Arc<dyn SnapshotStore>,
    executors: ExecutorRegistry,
    handlers: HandlerRegistry,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    config: ProcessorConfig,
    gates: StreamGates,
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("executors", &self.executors)
            .field("handlers", &self.handlers)
            .field("bus", &self.bus)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommandProcessor {
    /// Creates a processor with the default [`ProcessorConfig`].
    #[must_use]
    pub fn new(
        event_store: Arc<dyn EventStore>,
        snapshot_store: Arc<dyn SnapshotStore>,
        executors: ExecutorRegistry,
        handlers: HandlerRegistry,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            event_store,
            snapshot_store,
            executors,
            handlers,
            bus,
            clock,
            config: ProcessorConfig::default(),
            gates: StreamGates::default(),
        }
    }

    /// Replaces the tuning knobs.
    #[must_use]
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active tuning knobs.
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Rebuilds the current state of a stream: the latest snapshot (or the
    /// seed) plus every later fact, folded in version order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` when a stored fact or snapshot
    /// cannot be decoded or the versions are not contiguous, and propagates
    /// store failures.
    #[instrument(skip(self))]
    pub async fn rehydrate(&self, record_id: &str) -> Result<MedicalRecordSnapshot, DomainError> {
        let now = self.clock.now();
        let mut snapshot = match self.snapshot_store.load_latest(record_id).await? {
            Some(stored) => MedicalRecordSnapshot::from_stored(&stored)?,
            None => MedicalRecordSnapshot::seed(record_id, now),
        };
        let base = snapshot.version;

        let facts = self
            .event_store
            .query_from(record_id, snapshot.version + 1)
            .await?;
        for stored in &facts {
            let event = RecordEvent::from_stored(stored)?;
            snapshot = self.handlers.fold_snapshot(snapshot, &event, now)?;
        }

        debug!(
            snapshot_version = base,
            replayed = facts.len(),
            version = snapshot.version,
            "stream rehydrated"
        );
        Ok(snapshot)
    }

    /// Handles one command end to end.
    ///
    /// Waits for any other command on the same stream to finish publishing
    /// first. Concurrency conflicts on append, which need a writer outside
    /// this processor, restart the cycle from a fresh rehydrate, up to `max_attempts`
    /// tries in total.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step up to and including the
    /// append: `NotFound` or `InvalidCommand` from the executor, `Timeout`
    /// when the executor overruns `lookup_timeout`, `ConcurrencyConflict`
    /// once retries are exhausted, or a store failure. Nothing is appended
    /// in any of these cases.
    #[instrument(
        skip(self, command),
        fields(
            record_id = %command.record_id,
            command_type = %command.kind_type(),
            correlation_id = %command.correlation_id
        )
    )]
    pub async fn handle(&self, command: &RecordCommand) -> Result<CommandOutcome, DomainError> {
        let _permit = self.gates.acquire(&command.record_id).await;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        let commit = loop {
            match self.commit(command).await {
                Ok(commit) => break commit,
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    warn!(attempt, max_attempts, %error, "append conflicted, retrying");
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        };
        Ok(self.settle(commit).await)
    }

    /// Returns the full audit trail of a stream in version order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Deserialization` for facts that cannot be
    /// decoded, and propagates store failures.
    #[instrument(skip(self))]
    pub async fn events_by_record_id(&self, record_id: &str) -> Result<Vec<RecordEvent>, DomainError> {
        self.event_store
            .load_all(record_id)
            .await?
            .iter()
            .map(RecordEvent::from_stored)
            .collect()
    }

    /// Rehydrate, execute, and persist. Either every produced fact is
    /// appended or none is.
    async fn commit(&self, command: &RecordCommand) -> Result<Commit, DomainError> {
        let before = self.rehydrate(&command.record_id).await?;
        let executor = self.executors.get(command.kind_type())?;

        let produced = tokio::time::timeout(
            self.config.lookup_timeout,
            executor.produce(&before.state, before.version, command),
        )
        .await
        .map_err(|_| {
            DomainError::Timeout(format!(
                "{} on record {} exceeded {:?}",
                command.kind_type(),
                command.record_id,
                self.config.lookup_timeout
            ))
        })??;

        let events = self.stamp(command, &before, produced)?;
        if events.is_empty() {
            return Ok(Commit { before, events });
        }

        let stored = events
            .iter()
            .map(RecordEvent::to_stored)
            .collect::<Result<Vec<StoredEvent>, _>>()?;
        self.event_store
            .append(&command.record_id, before.version, &stored)
            .await?;

        info!(
            from_version = before.version,
            facts = stored.len(),
            "facts appended"
        );
        Ok(Commit { before, events })
    }

    /// Wraps produced kinds in metadata. Versions continue from `before`;
    /// each fact carries the status and parties of the state after it.
    fn stamp(
        &self,
        command: &RecordCommand,
        before: &MedicalRecordSnapshot,
        produced: Vec<RecordEventKind>,
    ) -> Result<Vec<RecordEvent>, DomainError> {
        let now = self.clock.now();
        let mut state = before.state.clone();
        let mut version = before.version;
        let mut events = Vec::with_capacity(produced.len());

        for kind in produced {
            state = self.handlers.fold(state, &kind)?;
            version += 1;
            events.push(RecordEvent {
                metadata: EventMetadata {
                    event_id: Uuid::new_v4(),
                    event_type: kind.event_type().as_str().to_owned(),
                    record_id: command.record_id.clone(),
                    hospital_id: state.hospital_id.clone(),
                    user_id: state.user_id.clone(),
                    version,
                    status: state.status,
                    correlation_id: command.correlation_id,
                    occurred_at: now,
                },
                kind,
            });
        }
        Ok(events)
    }

    /// Publish, fold, and maybe snapshot. Failures here are logged only.
    async fn settle(&self, commit: Commit) -> CommandOutcome {
        let Commit { before, events } = commit;
        let record_id = before.record_id.clone();
        let Some(last) = events.last() else {
            debug!("command produced no facts");
            return CommandOutcome {
                record_id,
                version: before.version,
                events,
                snapshot_saved: false,
                publish: PublishReport::default(),
            };
        };
        let version = last.metadata.version;

        let publish = self.bus.publish(&events).await;
        if publish.failed > 0 {
            warn!(
                failed = publish.failed,
                delivered = publish.delivered,
                "some subscribers did not handle the new facts"
            );
        }

        let now = self.clock.now();
        let folded = events
            .iter()
            .try_fold(before, |snapshot, event| {
                self.handlers.fold_snapshot(snapshot, event, now)
            });
        let snapshot_saved = match folded {
            Ok(after) => self.save_if_due(&after).await,
            Err(error) => {
                warn!(%error, version, "post-commit fold failed, snapshot skipped");
                false
            }
        };

        CommandOutcome {
            record_id,
            version,
            events,
            snapshot_saved,
            publish,
        }
    }

    async fn save_if_due(&self, snapshot: &MedicalRecordSnapshot) -> bool {
        let interval = self.config.snapshot_interval;
        if interval <= 0 || snapshot.version % interval != 0 {
            return false;
        }
        let saved = match snapshot.to_stored() {
            Ok(stored) => self.snapshot_store.save(&stored).await,
            Err(error) => Err(error),
        };
        match saved {
            Ok(()) => {
                info!(version = snapshot.version, "snapshot saved");
                true
            }
            Err(error) => {
                warn!(version = snapshot.version, %error, "snapshot save failed");
                false
            }
        }
    }
}
