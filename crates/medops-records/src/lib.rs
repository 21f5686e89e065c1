//! MedOps: medical record context.
//!
//! Responsible for the reservation lifecycle: turning commands into facts,
//! rehydrating state from snapshots and the fact log, and feeding the
//! denormalized read model.

pub mod application;
pub mod domain;
