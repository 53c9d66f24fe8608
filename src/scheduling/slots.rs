use std::collections::BTreeSet;

use time::{Date, Duration, OffsetDateTime, UtcOffset};

use super::{
    availability::{is_slot_available, parse_clock_time, AvailabilityWindow, DayOfWeek},
    conflict::{has_conflict, BookedSlot},
};

/// Bookable starts on `date` (clinic-local), stepping through every active
/// window in `step_minutes` increments. Starts not strictly after `now` are
/// left out.
pub fn open_slots(
    windows: &[AvailabilityWindow],
    booked: &[BookedSlot],
    date: Date,
    duration_minutes: i64,
    step_minutes: i64,
    clinic_offset: UtcOffset,
    now: OffsetDateTime,
) -> Vec<OffsetDateTime> {
    if duration_minutes <= 0 || step_minutes <= 0 {
        return Vec::new();
    }
    let day = DayOfWeek::from(date.weekday());
    let duration = Duration::minutes(duration_minutes);
    let step = Duration::minutes(step_minutes);

    let mut found = BTreeSet::new();
    for w in windows.iter().filter(|w| w.is_available && w.day_of_week == day) {
        let (Some(open), Some(close)) = (
            parse_clock_time(&w.start_time),
            parse_clock_time(&w.end_time),
        ) else {
            continue;
        };
        let close = date.with_time(close).assume_offset(clinic_offset);
        let mut candidate = date.with_time(open).assume_offset(clinic_offset);
        while let Some(end) = candidate.checked_add(duration).filter(|end| *end <= close) {
            if candidate > now
                && is_slot_available(windows, candidate, duration_minutes, clinic_offset)
                && !has_conflict(booked, candidate, end, None)
            {
                found.insert(candidate);
            }
            let Some(next) = candidate.checked_add(step) else {
                break;
            };
            candidate = next;
        }
    }
    found.into_iter().collect()
}
