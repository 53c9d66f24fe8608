use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::appointments::repo_types::AppointmentStatus;

/// The parts of an existing appointment the conflict check looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedSlot {
    pub appointment_id: Uuid,
    pub start: OffsetDateTime,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
}

impl BookedSlot {
    pub fn end(&self) -> Option<OffsetDateTime> {
        self.start.checked_add(Duration::minutes(self.duration_minutes))
    }
}

/// Half-open overlap of `[existing_start, existing_start + duration)` and
/// `[proposed_start, proposed_end)`. An existing end past the calendar's last
/// instant counts as later than any proposed start.
pub fn intervals_overlap(
    existing_start: OffsetDateTime,
    existing_duration_minutes: i64,
    proposed_start: OffsetDateTime,
    proposed_end: OffsetDateTime,
) -> bool {
    existing_start < proposed_end
        && existing_start
            .checked_add(Duration::minutes(existing_duration_minutes))
            .map_or(true, |end| end > proposed_start)
}

/// First blocking slot overlapping the proposed range, skipping `exclude`.
pub fn find_conflict(
    booked: &[BookedSlot],
    proposed_start: OffsetDateTime,
    proposed_end: OffsetDateTime,
    exclude: Option<Uuid>,
) -> Option<&BookedSlot> {
    booked.iter().find(|slot| {
        Some(slot.appointment_id) != exclude
            && slot.status.blocks_slot()
            && intervals_overlap(slot.start, slot.duration_minutes, proposed_start, proposed_end)
    })
}

pub fn has_conflict(
    booked: &[BookedSlot],
    proposed_start: OffsetDateTime,
    proposed_end: OffsetDateTime,
    exclude: Option<Uuid>,
) -> bool {
    find_conflict(booked, proposed_start, proposed_end, exclude).is_some()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use time::macros::datetime;

    pub(crate) fn slot(
        start: OffsetDateTime,
        minutes: i64,
        status: AppointmentStatus,
    ) -> BookedSlot {
        BookedSlot {
            appointment_id: Uuid::new_v4(),
            start,
            duration_minutes: minutes,
            status,
        }
    }

    const TEN: OffsetDateTime = datetime!(2030-01-07 10:00 UTC);

    #[test]
    fn partial_overlap_conflicts() {
        let booked = [slot(TEN, 30, AppointmentStatus::Scheduled)];
        let start = datetime!(2030-01-07 10:15 UTC);
        assert!(has_conflict(&booked, start, start + Duration::minutes(30), None));
    }

    #[test]
    fn abutting_ranges_do_not_conflict() {
        let booked = [slot(TEN, 30, AppointmentStatus::Scheduled)];
        let after = datetime!(2030-01-07 10:30 UTC);
        assert!(!has_conflict(&booked, after, after + Duration::minutes(30), None));
        let before = datetime!(2030-01-07 09:30 UTC);
        assert!(!has_conflict(&booked, before, TEN, None));
    }

    #[test]
    fn containment_in_either_direction_conflicts() {
        let booked = [slot(TEN, 60, AppointmentStatus::Confirmed)];
        let inner = datetime!(2030-01-07 10:20 UTC);
        assert!(has_conflict(&booked, inner, inner + Duration::minutes(10), None));
        let outer = datetime!(2030-01-07 09:00 UTC);
        assert!(has_conflict(&booked, outer, outer + Duration::minutes(180), None));
    }

    #[test]
    fn only_active_statuses_block() {
        let end = TEN + Duration::minutes(30);
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
        ] {
            assert!(has_conflict(&[slot(TEN, 30, status)], TEN, end, None), "{status:?}");
        }
        for status in [
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
            AppointmentStatus::Completed,
        ] {
            assert!(!has_conflict(&[slot(TEN, 30, status)], TEN, end, None), "{status:?}");
        }
    }

    #[test]
    fn excluded_appointment_is_ignored() {
        let own = slot(TEN, 30, AppointmentStatus::Scheduled);
        let id = own.appointment_id;
        let booked = [own];
        let later = TEN + Duration::minutes(15);
        assert!(!has_conflict(&booked, later, later + Duration::minutes(30), Some(id)));
        assert!(has_conflict(&booked, later, later + Duration::minutes(30), None));
    }

    #[test]
    fn find_conflict_reports_the_offender() {
        let first = slot(TEN, 30, AppointmentStatus::Cancelled);
        let second = slot(TEN, 30, AppointmentStatus::Scheduled);
        let expected = second.appointment_id;
        let booked = [first, second];
        let hit = find_conflict(&booked, TEN, TEN + Duration::minutes(30), None).unwrap();
        assert_eq!(hit.appointment_id, expected);
        assert_eq!(hit.end(), Some(TEN + Duration::minutes(30)));
    }
}
