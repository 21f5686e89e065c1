//! Application layer: orchestration, publication, and read-side queries.

pub mod command_processor;
pub mod event_bus;
pub mod query_handlers;
pub mod view_projector;
