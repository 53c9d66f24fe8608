//! Booking rules shared by appointment creation and rescheduling.

pub mod availability;
pub mod conflict;
pub mod slots;

use time::{Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use availability::{is_slot_available, AvailabilityWindow};
use conflict::{find_conflict, BookedSlot};

pub const MIN_DURATION_MINUTES: i64 = 15;
pub const MAX_DURATION_MINUTES: i64 = 480;

pub fn validate_duration(minutes: i64) -> AppResult<()> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        )))
    }
}

fn outside_calendar() -> AppError {
    AppError::validation("appointmentDate is outside the bookable range")
}

/// Range of starts whose appointments could overlap a span of
/// `duration_minutes` starting at `start`.
pub fn overlap_lookup_range(
    start: OffsetDateTime,
    duration_minutes: i64,
) -> AppResult<(OffsetDateTime, OffsetDateTime)> {
    let from = start
        .checked_sub(Duration::minutes(MAX_DURATION_MINUTES))
        .ok_or_else(outside_calendar)?;
    let to = start
        .checked_add(Duration::minutes(duration_minutes))
        .ok_or_else(outside_calendar)?;
    Ok((from, to))
}

/// Checks run before a booking or reschedule is written: the start lies in
/// the future, the doctor's availability covers the span, and no active
/// appointment of that doctor (other than `exclude`) overlaps it.
pub fn check_slot(
    availability: &[AvailabilityWindow],
    booked: &[BookedSlot],
    start: OffsetDateTime,
    duration_minutes: i64,
    exclude: Option<Uuid>,
    now: OffsetDateTime,
    clinic_offset: UtcOffset,
) -> AppResult<()> {
    if start <= now {
        return Err(AppError::validation_code(
            "APPOINTMENT_IN_PAST",
            "Appointment date must be in the future",
        ));
    }
    if !is_slot_available(availability, start, duration_minutes, clinic_offset) {
        return Err(AppError::validation_code(
            "DOCTOR_NOT_AVAILABLE",
            "Doctor is not available at the requested time",
        ));
    }
    let end = start
        .checked_add(Duration::minutes(duration_minutes))
        .ok_or_else(outside_calendar)?;
    if let Some(hit) = find_conflict(booked, start, end, exclude) {
        tracing::debug!(conflicting = %hit.appointment_id, "slot conflict");
        return Err(AppError::conflict(
            "TIME_SLOT_CONFLICT",
            "The requested time slot conflicts with an existing appointment",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::repo_types::AppointmentStatus;
    use availability::{tests::window, DayOfWeek};
    use conflict::tests::slot;
    use time::macros::{datetime, offset};

    const NOW: OffsetDateTime = datetime!(2030-01-01 12:00 UTC);
    const UTC: UtcOffset = UtcOffset::UTC;

    fn monday_nine_to_five() -> Vec<AvailabilityWindow> {
        vec![window(DayOfWeek::Monday, "09:00", "17:00")]
    }

    fn code(r: AppResult<()>) -> &'static str {
        r.unwrap_err().code()
    }

    #[test]
    fn scenario_window_containment() {
        let av = monday_nine_to_five();
        let at_open = datetime!(2030-01-07 09:00 UTC);
        assert!(check_slot(&av, &[], at_open, 30, None, NOW, UTC).is_ok());
        let near_close = datetime!(2030-01-07 16:45 UTC);
        assert_eq!(
            code(check_slot(&av, &[], near_close, 30, None, NOW, UTC)),
            "DOCTOR_NOT_AVAILABLE"
        );
    }

    #[test]
    fn scenario_overlap_and_abutment() {
        let av = monday_nine_to_five();
        let booked = [slot(
            datetime!(2030-01-07 10:00 UTC),
            30,
            AppointmentStatus::Scheduled,
        )];
        let overlapping = datetime!(2030-01-07 10:15 UTC);
        assert_eq!(
            code(check_slot(&av, &booked, overlapping, 30, None, NOW, UTC)),
            "TIME_SLOT_CONFLICT"
        );
        let abutting = datetime!(2030-01-07 10:30 UTC);
        assert!(check_slot(&av, &booked, abutting, 30, None, NOW, UTC).is_ok());
    }

    #[test]
    fn scenario_cancelled_slot_is_rebookable() {
        let av = monday_nine_to_five();
        let start = datetime!(2030-01-07 10:00 UTC);
        let booked = [slot(start, 30, AppointmentStatus::Cancelled)];
        assert!(check_slot(&av, &booked, start, 30, None, NOW, UTC).is_ok());
    }

    #[test]
    fn past_start_is_rejected_first() {
        let av = monday_nine_to_five();
        let err = check_slot(&av, &[], datetime!(2029-12-31 09:00 UTC), 30, None, NOW, UTC)
            .unwrap_err();
        assert_eq!(err.code(), "APPOINTMENT_IN_PAST");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(
            code(check_slot(&av, &[], NOW, 30, None, NOW, UTC)),
            "APPOINTMENT_IN_PAST"
        );
    }

    #[test]
    fn conflict_is_distinct_from_unavailability() {
        let av = monday_nine_to_five();
        let start = datetime!(2030-01-07 10:00 UTC);
        let booked = [slot(start, 30, AppointmentStatus::InProgress)];
        let err = check_slot(&av, &booked, start, 30, None, NOW, UTC).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn reschedule_excludes_itself() {
        let av = monday_nine_to_five();
        let own = slot(datetime!(2030-01-07 10:00 UTC), 30, AppointmentStatus::Scheduled);
        let id = own.appointment_id;
        let booked = [own];
        let later = datetime!(2030-01-07 10:15 UTC);
        assert!(check_slot(&av, &booked, later, 30, Some(id), NOW, UTC).is_ok());
    }

    #[test]
    fn last_day_of_calendar_is_rejected_without_panicking() {
        let av = [window(DayOfWeek::Friday, "09:00", "17:00")];
        let last = datetime!(9999-12-31 23:50 UTC);
        let outcome = std::panic::catch_unwind(|| check_slot(&av, &[], last, 30, None, NOW, UTC));
        assert_eq!(code(outcome.unwrap()), "DOCTOR_NOT_AVAILABLE");
        let shifted = check_slot(&av, &[], last, 30, None, NOW, offset!(+5));
        assert_eq!(code(shifted), "DOCTOR_NOT_AVAILABLE");
    }

    #[test]
    fn overlap_lookup_range_rejects_unrepresentable_ends() {
        let start = datetime!(2030-01-07 10:00 UTC);
        let (from, to) = overlap_lookup_range(start, 30).unwrap();
        assert_eq!(from, datetime!(2030-01-07 02:00 UTC));
        assert_eq!(to, datetime!(2030-01-07 10:30 UTC));
        let err = overlap_lookup_range(datetime!(9999-12-31 23:50 UTC), 30).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn duration_bounds() {
        assert!(validate_duration(15).is_ok());
        assert!(validate_duration(480).is_ok());
        assert!(validate_duration(14).is_err());
        assert!(validate_duration(481).is_err());
    }
}
