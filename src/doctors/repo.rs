use anyhow::Context;
use sqlx::{types::Json, PgExecutor, PgPool};
use uuid::Uuid;

use super::repo_types::{Doctor, DoctorListing, DoctorListingRow, DoctorRow, NewDoctor};

const DOCTOR_COLUMNS: &str = "id, user_id, license_number, specializations, experience_years, \
     education, languages, bio, availability, consultation_fee, is_accepting_new_patients, \
     is_verified, created_at, updated_at";

impl Doctor {
    pub async fn create<'e, E: PgExecutor<'e>>(
        db: E,
        user_id: Uuid,
        new: &NewDoctor,
    ) -> anyhow::Result<Doctor> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            r#"
            INSERT INTO doctors
                (user_id, license_number, specializations, experience_years, languages,
                 consultation_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&new.license_number)
        .bind(&new.specializations)
        .bind(new.experience_years)
        .bind(&new.languages)
        .bind(new.consultation_fee)
        .fetch_one(db)
        .await
        .context("insert doctor")?;
        Ok(row.into())
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
    ) -> anyhow::Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find doctor by id")?;
        Ok(row.map(Doctor::from))
    }

    pub async fn find_by_user<'e, E: PgExecutor<'e>>(
        db: E,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find doctor by user")?;
        Ok(row.map(Doctor::from))
    }

    /// Loads the doctor and locks the row until the transaction ends, so
    /// concurrent bookings for the same doctor run their conflict checks one
    /// at a time.
    pub async fn lock_for_booking<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
    ) -> anyhow::Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("lock doctor for booking")?;
        Ok(row.map(Doctor::from))
    }

    /// Active doctors, optionally narrowed by specialization and by whether
    /// they take new patients.
    pub async fn list(
        db: &PgPool,
        specialization: Option<&str>,
        accepting_only: bool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<DoctorListing>> {
        let columns = DOCTOR_COLUMNS
            .split(", ")
            .map(|c| format!("d.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query_as::<_, DoctorListingRow>(&format!(
            r#"
            SELECT {columns}, u.first_name, u.last_name
              FROM doctors d
              JOIN users u ON u.id = d.user_id
             WHERE u.is_active
               AND ($1::text IS NULL OR $1 = ANY(d.specializations))
               AND (NOT $2 OR d.is_accepting_new_patients)
             ORDER BY u.last_name, u.first_name
             LIMIT $3 OFFSET $4
            "#
        ))
        .bind(specialization)
        .bind(accepting_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list doctors")?;
        Ok(rows.into_iter().map(DoctorListing::from).collect())
    }

    pub async fn save(&self, db: &PgPool) -> anyhow::Result<Doctor> {
        let row = sqlx::query_as::<_, DoctorRow>(&format!(
            r#"
            UPDATE doctors
               SET license_number = $2, specializations = $3, experience_years = $4,
                   education = $5, languages = $6, bio = $7, availability = $8,
                   consultation_fee = $9, is_accepting_new_patients = $10, is_verified = $11,
                   updated_at = now()
             WHERE id = $1
            RETURNING {DOCTOR_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.license_number)
        .bind(&self.specializations)
        .bind(self.experience_years)
        .bind(Json(&self.education))
        .bind(&self.languages)
        .bind(&self.bio)
        .bind(Json(&self.availability))
        .bind(self.consultation_fee)
        .bind(self.is_accepting_new_patients)
        .bind(self.is_verified)
        .fetch_one(db)
        .await
        .context("update doctor")?;
        Ok(row.into())
    }
}
