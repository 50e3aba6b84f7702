//! Timestamp and calendar utilities
//!
//! Lecture dates are calendar days in the campus timezone, expressed as a
//! fixed offset from UTC. Stored timestamps are always UTC.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc,
};

use crate::{Error, Result};

/// Storage format for lecture dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

fn campus_offset(offset_minutes: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(offset_minutes * 60)
        .ok_or_else(|| Error::Config(format!("Invalid UTC offset: {} minutes", offset_minutes)))
}

/// Calendar date at `now` in the campus timezone
pub fn campus_date(now: DateTime<Utc>, offset_minutes: i32) -> Result<NaiveDate> {
    Ok(now.with_timezone(&campus_offset(offset_minutes)?).date_naive())
}

/// Day of week with Sunday = 0 through Saturday = 6
pub fn day_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// UTC instant of the given wall-clock time on `date` in the campus timezone
pub fn campus_instant(date: NaiveDate, time: NaiveTime, offset_minutes: i32) -> Result<DateTime<Utc>> {
    let offset = campus_offset(offset_minutes)?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Internal(format!("Ambiguous local time {} {}", date, time)))
}

/// UTC instant of campus midnight starting `date`
pub fn campus_midnight(date: NaiveDate, offset_minutes: i32) -> Result<DateTime<Utc>> {
    campus_instant(date, NaiveTime::MIN, offset_minutes)
}

/// `true` while `now` is before campus midnight of `date` plus `hours`
pub fn within_hours_of_date(
    date: NaiveDate,
    hours: i64,
    now: DateTime<Utc>,
    offset_minutes: i32,
) -> Result<bool> {
    let midnight = campus_midnight(date, offset_minutes)?;
    let deadline = Duration::try_hours(hours)
        .and_then(|window| midnight.checked_add_signed(window))
        .ok_or_else(|| Error::Config(format!("Window of {} hours is out of range", hours)))?;
    Ok(now <= deadline)
}

/// Parse a stored `YYYY-MM-DD` lecture date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| Error::Internal(format!("Corrupt stored date '{}': {}", s, e)))
}

/// Format a lecture date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Format a timestamp for storage
///
/// Fixed microsecond precision keeps stored values ordered when compared as text.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Corrupt stored timestamp '{}': {}", s, e)))
}

/// Parse a slot time in 24-hour `HH:MM`
pub fn parse_slot_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| Error::InvalidInput(format!("Invalid slot time '{}': {}", s, e)))
}
