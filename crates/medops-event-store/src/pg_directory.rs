//! `PostgreSQL` implementation of the `Directory` trait.

use async_trait::async_trait;
use sqlx::PgPool;

use medops_core::directory::Directory;
use medops_core::error::DomainError;

use crate::infra;
use crate::schema::{ADMINS_TABLE, DOCTORS_TABLE, HOSPITALS_TABLE, TREATMENT_PRODUCTS_TABLE, USERS_TABLE};

/// Reads display names from the `(id, name)` lookup tables.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Creates a new `PgDirectory`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `table` is always one of the schema constants.
    async fn name_in(&self, table: &'static str, id: &str) -> Result<Option<String>, DomainError> {
        let sql = format!("SELECT name FROM {table} WHERE id = $1");
        sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(infra)
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn admin_name(&self, admin_id: &str) -> Result<Option<String>, DomainError> {
        self.name_in(ADMINS_TABLE, admin_id).await
    }

    async fn doctor_name(&self, doctor_id: &str) -> Result<Option<String>, DomainError> {
        self.name_in(DOCTORS_TABLE, doctor_id).await
    }

    async fn user_name(&self, user_id: &str) -> Result<Option<String>, DomainError> {
        self.name_in(USERS_TABLE, user_id).await
    }

    async fn hospital_name(&self, hospital_id: &str) -> Result<Option<String>, DomainError> {
        self.name_in(HOSPITALS_TABLE, hospital_id).await
    }

    async fn treatment_product_name(
        &self,
        treatment_product_id: &str,
    ) -> Result<Option<String>, DomainError> {
        self.name_in(TREATMENT_PRODUCTS_TABLE, treatment_product_id)
            .await
    }
}
