use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::instrument;

use super::{
    dto::{CreateAppointmentRequest, ListQuery},
    repo_types::Appointment,
    services,
};
use crate::{
    auth::{
        actor::Actor,
        extractors::{AdminOnly, AuthUser, Authorized, PatientsOnly},
    },
    error::AppResult,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/:uid",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
}

#[instrument(skip(state, user))]
pub async fn list_appointments(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<Appointment>>> {
    let actor = Actor::resolve(&state, user).await?;
    Ok(Json(services::list(&state, &actor, &q).await?))
}

#[instrument(skip(state, auth, req))]
pub async fn create_appointment(
    State(state): State<AppState>,
    auth: Authorized<PatientsOnly>,
    Json(req): Json<CreateAppointmentRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<Appointment>)> {
    let actor = Actor::resolve(&state, auth.user).await?;
    let appt = services::book(&state, &actor, req).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/appointments/{}", appt.uid)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(appt)))
}

#[instrument(skip(state, user))]
pub async fn get_appointment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<Appointment>> {
    let actor = Actor::resolve(&state, user).await?;
    let appt = services::load(&state, &uid).await?;
    actor.ensure_participant(&appt)?;
    Ok(Json(appt))
}

#[instrument(skip(state, user, payload))]
pub async fn update_appointment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(uid): Path<String>,
    Json(payload): Json<Map<String, Value>>,
) -> AppResult<Json<Appointment>> {
    let actor = Actor::resolve(&state, user).await?;
    Ok(Json(services::update(&state, &actor, &uid, payload).await?))
}

#[instrument(skip(state, auth))]
pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    Path(uid): Path<String>,
) -> AppResult<StatusCode> {
    services::delete(&state, &auth.user, &uid).await?;
    Ok(StatusCode::NO_CONTENT)
}
