//! Test directory: a `Directory` backed by fixed name tables.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use medops_core::directory::Directory;
use medops_core::error::DomainError;

/// Resolves names from in-memory tables filled through the builder methods.
///
/// Unknown ids resolve to `None`. With [`StaticDirectory::with_delay`] every
/// lookup sleeps first, which lets tests exercise lookup timeouts.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    admins: HashMap<String, String>,
    doctors: HashMap<String, String>,
    users: HashMap<String, String>,
    hospitals: HashMap<String, String>,
    treatment_products: HashMap<String, String>,
    delay: Option<Duration>,
}

impl StaticDirectory {
    /// An empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an admin.
    #[must_use]
    pub fn with_admin(mut self, id: &str, name: &str) -> Self {
        self.admins.insert(id.to_owned(), name.to_owned());
        self
    }

    /// Adds a doctor.
    #[must_use]
    pub fn with_doctor(mut self, id: &str, name: &str) -> Self {
        self.doctors.insert(id.to_owned(), name.to_owned());
        self
    }

    /// Adds a patient.
    #[must_use]
    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.insert(id.to_owned(), name.to_owned());
        self
    }

    /// Adds a hospital.
    #[must_use]
    pub fn with_hospital(mut self, id: &str, name: &str) -> Self {
        self.hospitals.insert(id.to_owned(), name.to_owned());
        self
    }

    /// Adds a treatment product.
    #[must_use]
    pub fn with_treatment_product(mut self, id: &str, name: &str) -> Self {
        self.treatment_products
            .insert(id.to_owned(), name.to_owned());
        self
    }

    /// Makes every lookup wait `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The directory used by the reservation walkthrough tests: user `U1`,
    /// hospital `H1`, product `P1`, admin `A1`, doctor `D1`.
    #[must_use]
    pub fn clinic() -> Self {
        Self::new()
            .with_user("U1", "Park Jisoo")
            .with_hospital("H1", "Seoul Central")
            .with_treatment_product("P1", "Laser Toning")
            .with_admin("A1", "Lee")
            .with_doctor("D1", "Dr. Kim")
    }

    async fn lookup(&self, table: &HashMap<String, String>, id: &str) -> Option<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        table.get(id).cloned()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn admin_name(&self, admin_id: &str) -> Result<Option<String>, DomainError> {
        Ok(self.lookup(&self.admins, admin_id).await)
    }

    async fn doctor_name(&self, doctor_id: &str) -> Result<Option<String>, DomainError> {
        Ok(self.lookup(&self.doctors, doctor_id).await)
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, DomainError> {
        Ok(self.lookup(&self.users, user_id).await)
    }

    async fn hospital_name(&self, hospital_id: &str) -> Result<Option<String>, DomainError> {
        Ok(self.lookup(&self.hospitals, hospital_id).await)
    }

    async fn treatment_product_name(
        &self,
        treatment_product_id: &str,
    ) -> Result<Option<String>, DomainError> {
        Ok(self
            .lookup(&self.treatment_products, treatment_product_id)
            .await)
    }
}
