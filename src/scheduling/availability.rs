use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime, Time, UtcOffset, Weekday};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Monday => DayOfWeek::Monday,
            Weekday::Tuesday => DayOfWeek::Tuesday,
            Weekday::Wednesday => DayOfWeek::Wednesday,
            Weekday::Thursday => DayOfWeek::Thursday,
            Weekday::Friday => DayOfWeek::Friday,
            Weekday::Saturday => DayOfWeek::Saturday,
            Weekday::Sunday => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        f.write_str(name)
    }
}

fn default_true() -> bool {
    true
}

/// Recurring weekly interval during which a doctor takes bookings. Times are
/// zero-padded `HH:MM` clinic-local clock times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    pub day_of_week: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl AvailabilityWindow {
    pub fn validate(&self) -> Result<(), String> {
        for t in [&self.start_time, &self.end_time] {
            if !is_valid_clock_time(t) {
                return Err(format!("invalid time {t:?}, expected HH:MM"));
            }
        }
        if self.start_time >= self.end_time {
            return Err(format!(
                "window on {} must start before it ends ({} >= {})",
                self.day_of_week, self.start_time, self.end_time
            ));
        }
        Ok(())
    }

    /// Whether `[start, end)` given as `HH:MM` lies inside this window.
    fn contains(&self, start: &str, end: &str) -> bool {
        let (ws, we) = (self.start_time.as_str(), self.end_time.as_str());
        ws <= start && start < we && ws < end && end <= we
    }
}

pub fn is_valid_clock_time(s: &str) -> bool {
    lazy_static! {
        static ref CLOCK_RE: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
    }
    CLOCK_RE.is_match(s)
}

pub fn parse_clock_time(s: &str) -> Option<Time> {
    if !is_valid_clock_time(s) {
        return None;
    }
    let hour = s[..2].parse().ok()?;
    let minute = s[3..].parse().ok()?;
    Time::from_hms(hour, minute, 0).ok()
}

pub fn clock_time(dt: OffsetDateTime) -> String {
    format!("{:02}:{:02}", dt.hour(), dt.minute())
}

/// True iff an active window on the start's clinic-local weekday contains the
/// whole `[start, start + duration)` span. A span that ends on a later
/// calendar day, or past the last representable instant, is never available.
pub fn is_slot_available(
    windows: &[AvailabilityWindow],
    proposed_start: OffsetDateTime,
    duration_minutes: i64,
    clinic_offset: UtcOffset,
) -> bool {
    if duration_minutes <= 0 {
        return false;
    }
    let Some(local_start) = proposed_start.checked_to_offset(clinic_offset) else {
        return false;
    };
    let Some(local_end) = local_start.checked_add(Duration::minutes(duration_minutes)) else {
        return false;
    };
    if local_end.date() != local_start.date() {
        return false;
    }

    let day = DayOfWeek::from(local_start.weekday());
    let start = clock_time(local_start);
    let end = clock_time(local_end);

    windows
        .iter()
        .filter(|w| w.is_available && w.day_of_week == day)
        .any(|w| w.contains(&start, &end))
}
