//! Shared application state and its wiring.

use std::sync::Arc;

use medops_core::clock::{Clock, SystemClock};
use medops_core::directory::Directory;
use medops_core::repository::{EventStore, SnapshotStore};
use medops_core::view::ViewRepository;
use medops_event_store::pg_directory::PgDirectory;
use medops_event_store::pg_event_store::PgEventStore;
use medops_event_store::pg_snapshot_store::PgSnapshotStore;
use medops_event_store::pg_view_repository::PgViewRepository;
use medops_notifications::{NotificationHub, NotificationSubscriber};
use medops_records::application::command_processor::CommandProcessor;
use medops_records::application::event_bus::EventBus;
use medops_records::application::view_projector::ViewProjector;
use medops_records::domain::executors::default_executors;
use medops_records::domain::handlers::default_handlers;
use medops_records::domain::registry::{ExecutorRegistry, HandlerRegistry};
use sqlx::PgPool;

use crate::config::EngineConfig;
use crate::error::AppError;

/// Storage, lookup, and time sources the engine runs against.
pub struct Ports {
    /// The fact log.
    pub event_store: Arc<dyn EventStore>,
    /// Snapshot rows.
    pub snapshot_store: Arc<dyn SnapshotStore>,
    /// The read model.
    pub views: Arc<dyn ViewRepository>,
    /// Name lookups.
    pub directory: Arc<dyn Directory>,
    /// Timestamp source.
    pub clock: Arc<dyn Clock>,
}

impl Ports {
    /// PostgreSQL-backed ports sharing one pool.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            event_store: Arc::new(PgEventStore::new(pool.clone())),
            snapshot_store: Arc::new(PgSnapshotStore::new(pool.clone())),
            views: Arc::new(PgViewRepository::new(pool.clone())),
            directory: Arc::new(PgDirectory::new(pool.clone())),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The write path.
    pub processor: Arc<CommandProcessor>,
    /// The read model.
    pub views: Arc<dyn ViewRepository>,
    /// Live dashboard subscriptions.
    pub hub: Arc<NotificationHub>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("processor", &self.processor)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Assembles the engine: registries, the event bus with the view
    /// projector ahead of the notification fanout, and the processor.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Registry` if a command or fact kind has no owner.
    pub fn wire(ports: Ports, engine: &EngineConfig) -> Result<Self, AppError> {
        let hub = Arc::new(NotificationHub::new(engine.notification_buffer));

        let bus = EventBus::new(engine.subscriber_timeout)
            .with_subscriber(Arc::new(ViewProjector::new(
                Arc::clone(&ports.views),
                Arc::clone(&ports.directory),
            )))
            .with_subscriber(Arc::new(NotificationSubscriber::new(
                Arc::clone(&hub),
                Arc::clone(&ports.views),
            )));

        let processor = CommandProcessor::new(
            ports.event_store,
            ports.snapshot_store,
            ExecutorRegistry::new(default_executors(&ports.directory))?,
            HandlerRegistry::new(default_handlers())?,
            bus,
            ports.clock,
        )
        .with_config(engine.processor);

        Ok(Self {
            processor: Arc::new(processor),
            views: ports.views,
            hub,
        })
    }
}
