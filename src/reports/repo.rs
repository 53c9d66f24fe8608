use anyhow::Context;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{AiSummary, NewReport, Report, ReportRow};

const REPORT_COLUMNS: &str = "id, uid, patient_id, doctor_id, appointment_id, uploaded_by, title, \
     report_type, description, file_key, file_name, content_type, file_size, ai_analysis, \
     block_hash, chain_stored_at, created_at, updated_at";

pub async fn insert(db: &PgPool, new: &NewReport) -> anyhow::Result<Report> {
    let row = sqlx::query_as::<_, ReportRow>(&format!(
        r#"
        INSERT INTO reports
            (uid, patient_id, doctor_id, appointment_id, uploaded_by, title, report_type,
             description, file_key, file_name, content_type, file_size)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(&new.uid)
    .bind(new.patient_id)
    .bind(new.doctor_id)
    .bind(new.appointment_id)
    .bind(new.uploaded_by)
    .bind(&new.title)
    .bind(new.report_type.as_str())
    .bind(&new.description)
    .bind(&new.file_key)
    .bind(&new.file_name)
    .bind(&new.content_type)
    .bind(new.file_size)
    .fetch_one(db)
    .await
    .context("insert report")?;
    Report::try_from(row)
}

pub async fn find_by_uid(db: &PgPool, uid: &str) -> anyhow::Result<Option<Report>> {
    let row = sqlx::query_as::<_, ReportRow>(&format!(
        "SELECT {REPORT_COLUMNS} FROM reports WHERE uid = $1"
    ))
    .bind(uid)
    .fetch_optional(db)
    .await
    .context("find report by uid")?;
    row.map(Report::try_from).transpose()
}

/// Listing scope. `None` fields do not constrain.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportScope {
    pub patient_id: Option<Uuid>,
    /// Reports this user uploaded, or that name `doctor_id` as their doctor.
    pub uploaded_by: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

pub async fn list(
    db: &PgPool,
    scope: ReportScope,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Report>> {
    let rows = sqlx::query_as::<_, ReportRow>(&format!(
        r#"
        SELECT {REPORT_COLUMNS}
          FROM reports
         WHERE ($1::uuid IS NULL OR patient_id = $1)
           AND ($2::uuid IS NULL OR uploaded_by = $2 OR doctor_id = $3)
         ORDER BY created_at DESC
         LIMIT $4 OFFSET $5
        "#
    ))
    .bind(scope.patient_id)
    .bind(scope.uploaded_by)
    .bind(scope.doctor_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list reports")?;
    rows.into_iter().map(Report::try_from).collect()
}

pub async fn set_ai_analysis(db: &PgPool, id: Uuid, summary: &AiSummary) -> anyhow::Result<()> {
    sqlx::query("UPDATE reports SET ai_analysis = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(Json(summary))
        .execute(db)
        .await
        .context("store report ai analysis")?;
    Ok(())
}

pub async fn set_chain_block(db: &PgPool, id: Uuid, block_hash: &str) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE reports SET block_hash = $2, chain_stored_at = now(), updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(block_hash)
    .execute(db)
    .await
    .context("store report block hash")?;
    Ok(())
}
