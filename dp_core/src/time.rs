// ABOUTME: Utilities for working with times and timestamps.
// ABOUTME: Provides RFC3339 formatting and date-only stamps.
use ::time::{format_description::well_known::Rfc3339, OffsetDateTime};
use std::time::SystemTime;

/// Get the current system time (note: not necessarily UTC)
///
/// # Examples
///
/// ```
/// use dp_core::utc_now;
/// let now = utc_now();
/// assert!(now.duration_since(std::time::UNIX_EPOCH).is_ok());
/// ```
pub fn utc_now() -> SystemTime {
    SystemTime::now()
}

/// Convert a SystemTime to an RFC3339 timestamp string
///
/// # Examples
///
/// ```
/// use dp_core::to_rfc3339;
/// use std::time::{SystemTime, UNIX_EPOCH, Duration};
///
/// let time = UNIX_EPOCH + Duration::from_secs(1_609_459_200); // 2021-01-01
/// let timestamp = to_rfc3339(time);
/// assert_eq!(timestamp, "2021-01-01T00:00:00Z");
/// ```
pub fn to_rfc3339(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Get current time as an RFC3339 formatted string
///
/// # Examples
///
/// ```
/// use dp_core::time::now_iso8601;
/// let timestamp = now_iso8601();
/// assert!(!timestamp.is_empty());
/// ```
pub fn now_iso8601() -> String {
    to_rfc3339(utc_now())
}

/// Get today's UTC date as a `YYYY-MM-DD` string
///
/// Used for date-only columns such as loan return dates.
///
/// # Examples
///
/// ```
/// use dp_core::today_date;
/// let date = today_date();
/// assert_eq!(date.len(), 10);
/// ```
pub fn today_date() -> String {
    OffsetDateTime::now_utc().date().to_string()
}
