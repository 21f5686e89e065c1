//! Domain layer: commands, facts, aggregate state, and the pure logic that
//! connects them.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod executors;
pub mod handlers;
pub mod registry;
