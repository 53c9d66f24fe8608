use serde_json::{Map, Value};
use time::{macros::format_description, Date, Duration, OffsetDateTime, Time, UtcOffset};
use tracing::info;

use super::repo_types::{Doctor, DoctorPatch};
use crate::{
    appointments::repo as appointments_repo,
    auth::repo_types::{Role, User},
    error::{AppError, AppResult},
    permissions::{filter_update, into_patch, Entity},
    scheduling::{slots::open_slots, validate_duration, MAX_DURATION_MINUTES},
    state::AppState,
};

/// A doctor may edit only their own profile; admins may edit any.
pub fn ensure_can_edit(user: &User, doctor: &Doctor) -> AppResult<()> {
    match user.role {
        Role::Admin => Ok(()),
        Role::Doctor if doctor.user_id == user.id => Ok(()),
        _ => Err(AppError::forbidden("You can only update your own doctor profile")),
    }
}

pub async fn update_profile(
    st: &AppState,
    user: &User,
    mut doctor: Doctor,
    payload: Map<String, Value>,
) -> AppResult<Doctor> {
    ensure_can_edit(user, &doctor)?;
    let filtered = filter_update(Entity::Doctor, user.role, payload);
    if filtered.is_empty() {
        return Ok(doctor);
    }
    let patch: DoctorPatch = into_patch(filtered)?;
    doctor.apply(patch).map_err(AppError::validation)?;
    let saved = doctor.save(&st.db).await?;
    info!(doctor_id = %saved.id, by = %user.id, "doctor profile updated");
    Ok(saved)
}

pub fn parse_day(raw: &str) -> AppResult<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::validation("date must be formatted as YYYY-MM-DD"))
}

/// Starts of appointments that could overlap `day` in clinic-local time.
fn day_lookup_range(day: Date, offset: UtcOffset) -> AppResult<(OffsetDateTime, OffsetDateTime)> {
    let outside = || AppError::validation("date is outside the bookable range");
    let day_start = day.with_time(Time::MIDNIGHT).assume_offset(offset);
    let from = day_start
        .checked_sub(Duration::minutes(MAX_DURATION_MINUTES))
        .ok_or_else(outside)?;
    let to = day_start.checked_add(Duration::days(1)).ok_or_else(outside)?;
    Ok((from, to))
}

/// Open starts on `day` for a booking of `duration` minutes.
pub async fn day_slots(
    st: &AppState,
    doctor: &Doctor,
    day: Date,
    duration: i64,
    step: i64,
) -> AppResult<Vec<OffsetDateTime>> {
    validate_duration(duration)?;
    if !(5..=MAX_DURATION_MINUTES).contains(&step) {
        return Err(AppError::validation("step must be between 5 and 480 minutes"));
    }
    let offset = st.config.clinic_offset;
    let (from, to) = day_lookup_range(day, offset)?;
    let booked = appointments_repo::booked_slots(&st.db, doctor.id, from, to).await?;
    Ok(open_slots(
        &doctor.availability,
        &booked,
        day,
        duration,
        step,
        offset,
        OffsetDateTime::now_utc(),
    ))
}
