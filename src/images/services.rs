use std::collections::HashMap;

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    repo,
    repo_types::{ImageCategory, ReportImage},
};
use crate::{
    error::{AppError, AppResult},
    reports::repo_types::Report,
    state::AppState,
};

pub const IMAGE_URL_TTL_SECS: u64 = 30 * 60;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Stores the image bytes, then records the row. A primary image demotes the
/// previous primary in the same transaction.
pub async fn attach_image(
    st: &AppState,
    report: &Report,
    img: UploadItem,
    category: ImageCategory,
    primary: bool,
) -> AppResult<ReportImage> {
    if img.body.is_empty() {
        return Err(AppError::validation("image is empty"));
    }
    let Some(ext) = ext_from_mime(&img.content_type).filter(|_| is_image(&img.content_type))
    else {
        return Err(AppError::validation(format!(
            "unsupported image type {}",
            img.content_type
        )));
    };

    let id = Uuid::new_v4();
    let key = format!("reports/{}/{}/images/{}.{}", report.patient_id, report.uid, id, ext);
    let metadata = HashMap::from([
        ("report-uid".to_string(), report.uid.clone()),
        ("category".to_string(), category.as_str().to_string()),
    ]);
    st.storage
        .put_object(&key, img.body, &img.content_type, &metadata)
        .await
        .map_err(|e| {
            warn!(error = %e, key = %key, "image upload failed");
            AppError::unavailable("File storage is currently unavailable")
        })?;

    let row = async {
        let mut tx = st.db.begin().await.context("begin tx")?;
        if primary {
            repo::clear_primary_tx(&mut tx, report.id).await?;
        }
        let row = repo::insert_image_tx(
            &mut tx,
            id,
            report.id,
            &key,
            &img.content_type,
            category,
            primary,
        )
        .await?;
        tx.commit().await.context("commit tx")?;
        anyhow::Ok(row)
    }
    .await;
    let row = match row {
        Ok(row) => row,
        Err(e) => {
            if let Err(cleanup) = st.storage.delete_object(&key).await {
                warn!(error = %cleanup, key = %key, "orphaned image object");
            }
            return Err(e.into());
        }
    };

    info!(report_uid = %report.uid, image_id = %id, primary, "image attached");
    let url = st.storage.presign_get(&key, IMAGE_URL_TTL_SECS).await?;
    Ok(ReportImage::from_row(row, url))
}

pub async fn list_images(st: &AppState, report: &Report) -> AppResult<Vec<ReportImage>> {
    let rows = repo::list_by_report(&st.db, report.id).await?;
    let keys = rows.iter().map(|r| r.s3_key.clone()).collect();
    let urls = presign_many(st, keys, IMAGE_URL_TTL_SECS).await?;
    Ok(rows
        .into_iter()
        .zip(urls)
        .map(|(row, url)| ReportImage::from_row(row, url))
        .collect())
}

pub async fn presign_many(
    st: &AppState,
    keys: Vec<String>,
    expires_seconds: u64,
) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::with_capacity(keys.len());
    for k in keys {
        out.push(
            st.storage
                .presign_get(&k, expires_seconds)
                .await
                .with_context(|| format!("presign url for {k}"))?,
        );
    }
    Ok(out)
}

pub fn is_image(ct: &str) -> bool {
    ct.starts_with("image/")
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/dicom" | "application/dicom" => Some("dcm"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}
