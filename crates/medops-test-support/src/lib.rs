//! Shared test doubles for the MedOps reservation engine.

mod clock;
mod directory;
mod repository;
mod view;

pub use clock::FixedClock;
pub use directory::StaticDirectory;
pub use repository::{
    ConflictingEventStore, FailingEventStore, FailingSnapshotStore, InMemoryEventStore,
    InMemorySnapshotStore,
};
pub use view::{FailingViewRepository, InMemoryViewRepository};
