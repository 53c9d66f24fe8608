use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{ReportListQuery, ReportUpload},
    repo_types::{Report, ReportType},
    services::{self, ensure_can_access, MAX_REPORT_BYTES},
};
use crate::{
    auth::{actor::Actor, extractors::AuthUser},
    error::{AppError, AppResult},
    images::{
        repo_types::{ImageCategory, ReportImage},
        services::{attach_image, list_images, UploadItem},
    },
    state::AppState,
};

const BODY_LIMIT: usize = MAX_REPORT_BYTES + 256 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/reports",
            get(list_reports)
                .post(upload_report)
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .route("/reports/:uid", get(get_report))
        .route("/reports/:uid/file", get(download_report))
        .route(
            "/reports/:uid/images",
            get(report_images)
                .post(add_report_image)
                .layer(DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .route("/reports/:uid/verify", post(verify_report))
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::validation(format!("invalid multipart body: {e}"))
}

/// Fields: `file` (required), `title`, `type`, `description`, `patientId`,
/// `appointmentUid`.
async fn read_upload(mut mp: Multipart) -> AppResult<ReportUpload> {
    let mut file: Option<(String, String, Bytes)> = None;
    let mut title = String::new();
    let mut report_type = ReportType::Other;
    let mut description = None;
    let mut patient_id = None;
    let mut appointment_uid = None;

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("report").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let data = field.bytes().await.map_err(bad_multipart)?;
                file = Some((file_name, content_type, data));
            }
            "title" => title = field.text().await.map_err(bad_multipart)?,
            "type" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                report_type = raw
                    .trim()
                    .parse()
                    .map_err(|_| AppError::validation(format!("unknown report type {raw:?}")))?;
            }
            "description" => description = Some(field.text().await.map_err(bad_multipart)?),
            "patientId" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                patient_id = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::validation("patientId must be a UUID"))?,
                );
            }
            "appointmentUid" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                appointment_uid = Some(raw.trim().to_string()).filter(|s| !s.is_empty());
            }
            other => warn!(field = %other, "ignoring unknown multipart field"),
        }
    }

    let (file_name, content_type, body) =
        file.ok_or_else(|| AppError::validation("file is required"))?;
    Ok(ReportUpload {
        title,
        report_type,
        description,
        patient_id,
        appointment_uid,
        file_name,
        content_type,
        body,
    })
}

async fn load_visible(state: &AppState, actor: &Actor, uid: &str) -> AppResult<Report> {
    let report = services::load(state, uid).await?;
    ensure_can_access(actor, &report)?;
    Ok(report)
}

#[instrument(skip(state, user))]
pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(q): Query<ReportListQuery>,
) -> AppResult<Json<Vec<Report>>> {
    let actor = Actor::resolve(&state, user).await?;
    Ok(Json(services::list(&state, &actor, &q).await?))
}

#[instrument(skip(state, user, mp))]
pub async fn upload_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> AppResult<(StatusCode, Json<Report>)> {
    let upload = read_upload(mp).await?;
    let actor = Actor::resolve(&state, user).await?;
    let report = services::create(&state, &actor, upload).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[instrument(skip(state, user))]
pub async fn get_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<Report>> {
    let actor = Actor::resolve(&state, user).await?;
    Ok(Json(load_visible(&state, &actor, &uid).await?))
}

#[instrument(skip(state, user))]
pub async fn download_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<(HeaderMap, Bytes)> {
    let actor = Actor::resolve(&state, user).await?;
    let report = load_visible(&state, &actor, &uid).await?;
    let object = services::fetch_file(&state, &report).await?;

    let content_type = object.content_type.unwrap_or(report.content_type);
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, v);
    }
    let disposition = format!(
        "attachment; filename=\"{}\"",
        report.file_name.replace(['"', '\\'], "_")
    );
    if let Ok(v) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    Ok((headers, object.body))
}

/// Multipart with an `image` field, optional `category` and `primary`.
#[instrument(skip(state, user, mp))]
pub async fn add_report_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
    mut mp: Multipart,
) -> AppResult<(StatusCode, Json<ReportImage>)> {
    let mut image = None;
    let mut category = ImageCategory::default();
    let mut primary = false;
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(bad_multipart)?;
                image = Some(UploadItem { body, content_type });
            }
            "category" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                category = ImageCategory::parse(&raw)
                    .ok_or_else(|| AppError::validation(format!("unknown category {raw:?}")))?;
            }
            "primary" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                primary = matches!(raw.trim(), "true" | "1");
            }
            _ => {}
        }
    }
    let image = image.ok_or_else(|| AppError::validation("image is required"))?;

    let actor = Actor::resolve(&state, user).await?;
    let report = load_visible(&state, &actor, &uid).await?;
    let saved = attach_image(&state, &report, image, category, primary).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

#[instrument(skip(state, user))]
pub async fn report_images(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<Vec<ReportImage>>> {
    let actor = Actor::resolve(&state, user).await?;
    let report = load_visible(&state, &actor, &uid).await?;
    Ok(Json(list_images(&state, &report).await?))
}

#[instrument(skip(state, user))]
pub async fn verify_report(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = Actor::resolve(&state, user).await?;
    let report = load_visible(&state, &actor, &uid).await?;
    Ok(Json(services::verify(&state, &report).await?))
}
