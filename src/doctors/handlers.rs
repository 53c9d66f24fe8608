use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{DoctorQuery, SlotsQuery, SlotsResponse},
    repo_types::{Doctor, DoctorListing},
    services::{day_slots, parse_day, update_profile},
};
use crate::{
    auth::{
        extractors::{AuthUser, Authorized, DoctorsAndAdmins},
        repo_types::User,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors))
        .route("/doctors/:id", get(get_doctor).patch(patch_doctor))
        .route("/doctors/:id/slots", get(doctor_slots))
}

async fn load(st: &AppState, id: Uuid) -> AppResult<Doctor> {
    Doctor::find_by_id(&st.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Doctor not found"))
}

async fn listing(st: &AppState, doctor: Doctor) -> AppResult<DoctorListing> {
    let user = User::find_by_id(&st.db, doctor.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Doctor account not found"))?;
    Ok(DoctorListing {
        doctor,
        first_name: user.first_name,
        last_name: user.last_name,
    })
}

#[instrument(skip(state, _user))]
pub async fn list_doctors(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(q): Query<DoctorQuery>,
) -> AppResult<Json<Vec<DoctorListing>>> {
    let specialization = q
        .specialization
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let doctors = Doctor::list(
        &state.db,
        specialization,
        q.accepting,
        q.limit.clamp(1, 100),
        q.offset.max(0),
    )
    .await?;
    Ok(Json(doctors))
}

#[instrument(skip(state, _user))]
pub async fn get_doctor(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DoctorListing>> {
    let doctor = load(&state, id).await?;
    Ok(Json(listing(&state, doctor).await?))
}

#[instrument(skip(state, auth, payload))]
pub async fn patch_doctor(
    State(state): State<AppState>,
    auth: Authorized<DoctorsAndAdmins>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Map<String, Value>>,
) -> AppResult<Json<DoctorListing>> {
    let doctor = load(&state, id).await?;
    let updated = update_profile(&state, &auth.user, doctor, payload).await?;
    Ok(Json(listing(&state, updated).await?))
}

#[instrument(skip(state, _user))]
pub async fn doctor_slots(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<Uuid>,
    Query(q): Query<SlotsQuery>,
) -> AppResult<Json<SlotsResponse>> {
    let day = parse_day(&q.date)?;
    let doctor = load(&state, id).await?;
    let slots = day_slots(&state, &doctor, day, q.duration, q.step).await?;
    Ok(Json(SlotsResponse {
        doctor_id: doctor.id,
        date: q.date,
        duration: q.duration,
        slots,
    }))
}
