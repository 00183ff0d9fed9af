//! Calendar-day policy for attendance.
//!
//! Every "today" comparison in the attendance core is made against the
//! Philippine calendar day (UTC+8), regardless of where the server or the
//! scanning client runs. The conversion is a pure function so the boundary
//! rule can be unit-tested without a database.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Fixed day-boundary offset for attendance: Philippine Standard Time.
pub const LOCAL_OFFSET_HOURS: i64 = 8;

/// Converts an instant to the calendar date of the UTC+`offset_hours` day it
/// falls in.
pub fn to_local_calendar_date(instant: DateTime<Utc>, offset_hours: i64) -> NaiveDate {
    (instant + Duration::hours(offset_hours)).date_naive()
}

/// The attendance calendar date for `now` under the fixed UTC+8 policy.
pub fn attendance_date(now: DateTime<Utc>) -> NaiveDate {
    to_local_calendar_date(now, LOCAL_OFFSET_HOURS)
}

/// Formats a UTC instant as a local (UTC+8) `YYYY-MM-DD HH:MM:SS` string,
/// the shape the original frontend expects on the wire.
pub fn format_local_timestamp(instant: DateTime<Utc>) -> String {
    (instant + Duration::hours(LOCAL_OFFSET_HOURS))
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Parses a local (UTC+8) `YYYY-MM-DD HH:MM:SS` wire timestamp back to UTC.
pub fn parse_local_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok()?;
    Some((naive - Duration::hours(LOCAL_OFFSET_HOURS)).and_utc())
}
