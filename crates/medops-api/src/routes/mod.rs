//! Route modules.

pub mod health;
pub mod medical_records;
pub mod notifications;
