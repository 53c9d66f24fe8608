use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::PatientProfile,
    repo_types::Patient,
    services::{ensure_can_view, update_profile},
};
use crate::{
    auth::{
        extractors::{AuthUser, Authorized, DoctorsAndAdmins, PatientsOnly},
        repo_types::User,
    },
    error::{AppError, AppResult},
    pagination::Pagination,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/patients", get(list_patients))
        .route("/patients/me", get(my_profile))
        .route("/patients/:id", get(get_patient).patch(patch_patient))
}

async fn with_account(st: &AppState, patient: Patient) -> AppResult<PatientProfile> {
    let user = User::find_by_id(&st.db, patient.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Patient account not found"))?;
    Ok(PatientProfile { patient, user })
}

async fn load(st: &AppState, id: Uuid) -> AppResult<Patient> {
    Patient::find_by_id(&st.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Patient not found"))
}

#[instrument(skip(state, auth))]
pub async fn my_profile(
    State(state): State<AppState>,
    auth: Authorized<PatientsOnly>,
) -> AppResult<Json<PatientProfile>> {
    let patient = Patient::find_by_user(&state.db, auth.user.id)
        .await?
        .ok_or_else(|| {
            warn!(user_id = %auth.user.id, "patient account without profile");
            AppError::not_found("Patient profile not found")
        })?;
    Ok(Json(PatientProfile {
        patient,
        user: auth.user,
    }))
}

#[instrument(skip(state, _auth))]
pub async fn list_patients(
    State(state): State<AppState>,
    _auth: Authorized<DoctorsAndAdmins>,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<Patient>>> {
    let (limit, offset) = p.clamped();
    Ok(Json(Patient::list(&state.db, limit, offset).await?))
}

#[instrument(skip(state, user))]
pub async fn get_patient(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PatientProfile>> {
    let patient = load(&state, id).await?;
    ensure_can_view(&user, &patient)?;
    Ok(Json(with_account(&state, patient).await?))
}

#[instrument(skip(state, user, payload))]
pub async fn patch_patient(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<Map<String, Value>>,
) -> AppResult<Json<PatientProfile>> {
    let patient = load(&state, id).await?;
    let updated = update_profile(&state, &user, patient, payload).await?;
    Ok(Json(with_account(&state, updated).await?))
}
