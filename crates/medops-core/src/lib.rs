//! MedOps Core: shared domain abstractions.
//!
//! This crate defines the traits, persisted row shapes, and error taxonomy
//! that the medical-record context and its adapters depend on. It contains
//! no infrastructure code.

pub mod clock;
pub mod command;
pub mod directory;
pub mod error;
pub mod event;
pub mod repository;
pub mod status;
pub mod view;
