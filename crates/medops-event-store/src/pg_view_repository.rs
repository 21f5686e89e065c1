//! `PostgreSQL` implementation of the `ViewRepository` trait.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use medops_core::error::DomainError;
use medops_core::status::RecordStatus;
use medops_core::view::{MedicalRecordView, ViewRepository};

use crate::infra;

const COLUMNS: &str = "record_id, user_id, user_name, hospital_id, hospital_name, \
    doctor_id, doctor_name, note, status, start_time, end_time, \
    treatment_product_id, treatment_product_name, user_memo, version";

/// PostgreSQL-backed read model. Saves replace the whole row.
#[derive(Debug, Clone)]
pub struct PgViewRepository {
    pool: PgPool,
}

impl PgViewRepository {
    /// Creates a new `PgViewRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn select(
        &self,
        filter: &str,
        binds: &[&str],
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        let sql = format!("SELECT {COLUMNS} FROM medical_record_views WHERE {filter}");
        let mut query = sqlx::query_as::<_, ViewRow>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        if let Some((start, end)) = range {
            query = query.bind(start).bind(end);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(infra)?;
        rows.into_iter().map(MedicalRecordView::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ViewRow {
    record_id: String,
    user_id: String,
    user_name: String,
    hospital_id: String,
    hospital_name: String,
    doctor_id: Option<String>,
    doctor_name: Option<String>,
    note: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    treatment_product_id: String,
    treatment_product_name: String,
    user_memo: String,
    version: i64,
}

impl TryFrom<ViewRow> for MedicalRecordView {
    type Error = DomainError;

    fn try_from(row: ViewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: RecordStatus::from_str(&row.status)?,
            record_id: row.record_id,
            user_id: row.user_id,
            user_name: row.user_name,
            hospital_id: row.hospital_id,
            hospital_name: row.hospital_name,
            doctor_id: row.doctor_id,
            doctor_name: row.doctor_name,
            note: row.note,
            start_time: row.start_time,
            end_time: row.end_time,
            treatment_product_id: row.treatment_product_id,
            treatment_product_name: row.treatment_product_name,
            user_memo: row.user_memo,
            version: row.version,
        })
    }
}

#[async_trait]
impl ViewRepository for PgViewRepository {
    async fn find_by_id(&self, record_id: &str) -> Result<Option<MedicalRecordView>, DomainError> {
        let mut rows = self.select("record_id = $1", &[record_id], None).await?;
        Ok(rows.pop())
    }

    async fn save(&self, view: &MedicalRecordView) -> Result<(), DomainError> {
        let sql = format!(
            r"
            INSERT INTO medical_record_views ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (record_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                user_name = EXCLUDED.user_name,
                hospital_id = EXCLUDED.hospital_id,
                hospital_name = EXCLUDED.hospital_name,
                doctor_id = EXCLUDED.doctor_id,
                doctor_name = EXCLUDED.doctor_name,
                note = EXCLUDED.note,
                status = EXCLUDED.status,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                treatment_product_id = EXCLUDED.treatment_product_id,
                treatment_product_name = EXCLUDED.treatment_product_name,
                user_memo = EXCLUDED.user_memo,
                version = EXCLUDED.version
            WHERE medical_record_views.version < EXCLUDED.version
            "
        );
        sqlx::query(&sql)
            .bind(&view.record_id)
            .bind(&view.user_id)
            .bind(&view.user_name)
            .bind(&view.hospital_id)
            .bind(&view.hospital_name)
            .bind(&view.doctor_id)
            .bind(&view.doctor_name)
            .bind(&view.note)
            .bind(view.status.as_str())
            .bind(view.start_time)
            .bind(view.end_time)
            .bind(&view.treatment_product_id)
            .bind(&view.treatment_product_name)
            .bind(&view.user_memo)
            .bind(view.version)
            .execute(&self.pool)
            .await
            .map_err(infra)?;
        Ok(())
    }

    async fn find_by_hospital_in_range(
        &self,
        hospital_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        self.select(
            "hospital_id = $1 AND start_time >= $2 AND end_time <= $3 ORDER BY start_time ASC",
            &[hospital_id],
            Some((start, end)),
        )
        .await
    }

    async fn find_by_treatment_product_in_range(
        &self,
        treatment_product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        self.select(
            "treatment_product_id = $1 AND start_time >= $2 AND end_time <= $3 \
             ORDER BY start_time ASC",
            &[treatment_product_id],
            Some((start, end)),
        )
        .await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<MedicalRecordView>, DomainError> {
        self.select("user_id = $1 ORDER BY start_time DESC", &[user_id], None)
            .await
    }

    async fn find_by_user_and_hospital(
        &self,
        user_id: &str,
        hospital_id: &str,
    ) -> Result<Vec<MedicalRecordView>, DomainError> {
        self.select(
            "user_id = $1 AND hospital_id = $2 ORDER BY start_time DESC",
            &[user_id, hospital_id],
            None,
        )
        .await
    }
}
