use serde_json::{Map, Value};
use tracing::info;

use super::repo_types::{Patient, PatientPatch};
use crate::{
    auth::repo_types::{Role, User},
    error::{AppError, AppResult},
    permissions::{filter_update, into_patch, Entity},
    state::AppState,
};

/// Clinicians and admins see every patient; a patient sees only their own record.
pub fn ensure_can_view(user: &User, patient: &Patient) -> AppResult<()> {
    match user.role {
        Role::Doctor | Role::Admin => Ok(()),
        Role::Patient if patient.user_id == user.id => Ok(()),
        Role::Patient => Err(AppError::forbidden(
            "You can only access your own patient record",
        )),
    }
}

/// Applies the fields of `payload` the caller may write. Ownership is checked
/// before filtering.
pub async fn update_profile(
    st: &AppState,
    user: &User,
    mut patient: Patient,
    payload: Map<String, Value>,
) -> AppResult<Patient> {
    if user.role == Role::Patient && patient.user_id != user.id {
        return Err(AppError::forbidden("You can only update your own patient record"));
    }
    let filtered = filter_update(Entity::Patient, user.role, payload);
    if filtered.is_empty() {
        return Ok(patient);
    }
    let patch: PatientPatch = into_patch(filtered)?;
    patient.apply(patch).map_err(AppError::validation)?;
    let saved = patient.save(&st.db).await?;
    info!(patient_id = %saved.id, by = %user.id, "patient profile updated");
    Ok(saved)
}
