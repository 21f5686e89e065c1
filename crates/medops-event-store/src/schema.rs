//! Event store database schema.

use sqlx::PgPool;

use medops_core::error::DomainError;

use crate::infra;

/// The full schema: fact log, snapshots, view rows, and lookup tables.
/// Every statement is idempotent.
pub const INITIAL_SCHEMA: &str = include_str!("../../../migrations/0001_medical_records.sql");

/// Lookup table for admin names.
pub const ADMINS_TABLE: &str = "admins";
/// Lookup table for doctor names.
pub const DOCTORS_TABLE: &str = "doctors";
/// Lookup table for patient names.
pub const USERS_TABLE: &str = "users";
/// Lookup table for hospital names.
pub const HOSPITALS_TABLE: &str = "hospitals";
/// Lookup table for treatment product names.
pub const TREATMENT_PRODUCTS_TABLE: &str = "treatment_products";

/// Creates any missing table or index.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a statement fails.
pub async fn apply(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::raw_sql(INITIAL_SCHEMA)
        .execute(pool)
        .await
        .map_err(infra)?;
    Ok(())
}
