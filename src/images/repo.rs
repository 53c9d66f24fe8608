use anyhow::Context;
use sqlx::{Executor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{ImageCategory, ReportImageRow};

/// Insert an image row within a transaction.
pub async fn insert_image_tx(
    tx: &mut Transaction<'_, Postgres>,
    image_id: Uuid,
    report_id: Uuid,
    s3_key: &str,
    content_type: &str,
    category: ImageCategory,
    is_primary: bool,
) -> anyhow::Result<ReportImageRow> {
    let row = sqlx::query_as::<_, ReportImageRow>(
        r#"
        INSERT INTO report_images (id, report_id, s3_key, content_type, category, is_primary)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, report_id, s3_key, content_type, category, is_primary, created_at
        "#,
    )
    .bind(image_id)
    .bind(report_id)
    .bind(s3_key)
    .bind(content_type)
    .bind(category.as_str())
    .bind(is_primary)
    .fetch_one(&mut **tx)
    .await
    .context("insert report image")?;
    Ok(row)
}

/// Demote the current primary image of a report, if any.
pub async fn clear_primary_tx(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
) -> anyhow::Result<()> {
    tx.execute(
        sqlx::query(
            "UPDATE report_images SET is_primary = FALSE WHERE report_id = $1 AND is_primary",
        )
        .bind(report_id),
    )
    .await
    .context("clear primary image")?;
    Ok(())
}

/// Images of a report, primary first.
pub async fn list_by_report(db: &PgPool, report_id: Uuid) -> anyhow::Result<Vec<ReportImageRow>> {
    let rows = sqlx::query_as::<_, ReportImageRow>(
        r#"
        SELECT id, report_id, s3_key, content_type, category, is_primary, created_at
          FROM report_images
         WHERE report_id = $1
         ORDER BY is_primary DESC, created_at ASC
        "#,
    )
    .bind(report_id)
    .fetch_all(db)
    .await
    .context("list report images")?;
    Ok(rows)
}
