use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    ai::{DiagnoseRequest, Diagnosis, ImageAnalysis},
    blockchain::ChainRecord,
    hospitals::{nearby_or_empty, Hospital, NearbyQuery},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    patients::{repo_types::Patient, services::ensure_can_view},
    state::AppState,
};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ai/symptoms", post(analyze_symptoms))
        .route(
            "/ai/image",
            post(analyze_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .route("/hospitals/nearby", get(nearby_hospitals))
        .route("/blockchain/records/:patient_id", get(chain_records))
}

#[instrument(skip(state, user, body))]
pub async fn analyze_symptoms(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(mut body): Json<DiagnoseRequest>,
) -> AppResult<Json<Diagnosis>> {
    body.symptoms.retain(|s| !s.trim().is_empty());
    if body.symptoms.is_empty() {
        return Err(AppError::validation("symptoms must not be empty"));
    }
    if !state.ai.is_available().await {
        warn!(user_id = %user.id, "ai service unavailable");
        return Err(AppError::unavailable("AI service is currently unavailable"));
    }
    let diagnosis = state.ai.diagnose(&body).await.map_err(|e| {
        warn!(error = %format!("{e:#}"), "ai diagnose failed");
        AppError::unavailable("AI service is currently unavailable")
    })?;
    Ok(Json(diagnosis))
}

/// Multipart with one `image` field.
#[instrument(skip(state, user, mp))]
pub async fn analyze_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut mp: Multipart,
) -> AppResult<Json<ImageAnalysis>> {
    let mut image = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("image") {
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(format!("invalid image field: {e}")))?;
            image = Some((data, content_type));
        }
    }
    let (data, content_type) = image.ok_or_else(|| AppError::validation("image is required"))?;
    if !content_type.starts_with("image/") {
        return Err(AppError::validation("image must have an image/* content type"));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("image exceeds 10 MB"));
    }
    if !state.ai.is_available().await {
        warn!(user_id = %user.id, "ai service unavailable");
        return Err(AppError::unavailable("AI service is currently unavailable"));
    }
    let analysis = state
        .ai
        .analyze_image(&data, &content_type)
        .await
        .map_err(|e| {
            warn!(error = %format!("{e:#}"), "ai image analysis failed");
            AppError::unavailable("AI service is currently unavailable")
        })?;
    Ok(Json(analysis))
}

#[instrument(skip(state, _user))]
pub async fn nearby_hospitals(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(q): Query<NearbyQuery>,
) -> AppResult<Json<Vec<Hospital>>> {
    q.validate().map_err(AppError::validation)?;
    Ok(Json(nearby_or_empty(state.hospitals.as_ref(), q).await))
}

#[instrument(skip(state, user))]
pub async fn chain_records(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<Vec<ChainRecord>>> {
    let patient = Patient::find_by_id(&state.db, patient_id)
        .await?
        .ok_or_else(|| AppError::not_found("Patient not found"))?;
    ensure_can_view(&user, &patient)?;
    let records = state.chain.records(patient.id).await.map_err(|e| {
        warn!(error = %format!("{e:#}"), "chain records lookup failed");
        AppError::unavailable("Blockchain service is currently unavailable")
    })?;
    Ok(Json(records))
}
