use anyhow::Context;
use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

use super::repo_types::{Patient, PatientRow};

const PATIENT_COLUMNS: &str = "id, user_id, emergency_contact, medical_history, insurance, \
     blood_type, height_cm, weight_kg, lifestyle, created_at, updated_at";

impl Patient {
    /// Creates the empty clinical profile that accompanies a new patient account.
    pub async fn create<'e, E: PgExecutor<'e>>(db: E, user_id: Uuid) -> anyhow::Result<Patient> {
        let row = sqlx::query_as::<_, PatientRow>(&format!(
            "INSERT INTO patients (user_id) VALUES ($1) RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("insert patient")?;
        Ok(row.into())
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
    ) -> anyhow::Result<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find patient by id")?;
        Ok(row.map(Patient::from))
    }

    pub async fn find_by_user<'e, E: PgExecutor<'e>>(
        db: E,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Patient>> {
        let row = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find patient by user")?;
        Ok(row.map(Patient::from))
    }

    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Patient>> {
        let rows = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list patients")?;
        Ok(rows.into_iter().map(Patient::from).collect())
    }

    pub async fn save(&self, db: &PgPool) -> anyhow::Result<Patient> {
        let row = sqlx::query_as::<_, PatientRow>(&format!(
            r#"
            UPDATE patients
               SET emergency_contact = $2, medical_history = $3, insurance = $4,
                   blood_type = $5, height_cm = $6, weight_kg = $7, lifestyle = $8,
                   updated_at = now()
             WHERE id = $1
            RETURNING {PATIENT_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.emergency_contact.as_ref().map(Json))
        .bind(Json(&self.medical_history))
        .bind(self.insurance.as_ref().map(Json))
        .bind(&self.blood_type)
        .bind(self.height_cm)
        .bind(self.weight_kg)
        .bind(Json(&self.lifestyle))
        .fetch_one(db)
        .await
        .context("update patient")?;
        Ok(row.into())
    }
}
