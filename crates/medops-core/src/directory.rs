//! Read-only name lookups owned by collaborators outside the core.

use async_trait::async_trait;

use crate::error::DomainError;

/// Resolves identifiers to human-readable names.
///
/// `Ok(None)` means the identifier does not exist; callers decide whether
/// that is fatal.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up an admin's name.
    async fn admin_name(&self, admin_id: &str) -> Result<Option<String>, DomainError>;

    /// Look up a doctor's name.
    async fn doctor_name(&self, doctor_id: &str) -> Result<Option<String>, DomainError>;

    /// Look up a patient's name.
    async fn user_name(&self, user_id: &str) -> Result<Option<String>, DomainError>;

    /// Look up a hospital's name.
    async fn hospital_name(&self, hospital_id: &str) -> Result<Option<String>, DomainError>;

    /// Look up a treatment product's name.
    async fn treatment_product_name(
        &self,
        treatment_product_id: &str,
    ) -> Result<Option<String>, DomainError>;
}

/// Turns a missing name into `DomainError::NotFound`.
///
/// # Errors
///
/// Propagates the lookup error, or returns `NotFound` for `Ok(None)`.
pub fn require_name(
    kind: &'static str,
    id: &str,
    lookup: Result<Option<String>, DomainError>,
) -> Result<String, DomainError> {
    lookup?.ok_or_else(|| DomainError::not_found(kind, id))
}
