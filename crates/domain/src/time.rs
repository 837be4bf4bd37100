//! Timestamps and trailing telemetry windows.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Instant in UTC: sample times, fire times, rule creation.
pub type Timestamp = DateTime<Utc>;

#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Lower bound of the window covering the last `minutes` before `now`.
/// Fractional minutes are honored; a negative window is empty.
#[must_use]
pub fn window_start(now: Timestamp, minutes: f64) -> Timestamp {
    Duration::from_std(seconds(minutes * 60.0))
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Wire-level seconds as a duration. Negative or NaN counts as zero and
/// anything too large saturates.
#[must_use]
pub fn seconds(value: f64) -> std::time::Duration {
    std::time::Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(std::time::Duration::MAX)
}

/// Parse an ISO-8601 instant. Text without an offset is taken as UTC.
#[must_use]
pub fn parse_utc(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    text.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Milliseconds since the Unix epoch, the storage form of sample times.
#[must_use]
pub fn to_unix_millis(ts: Timestamp) -> i64 {
    ts.timestamp_millis()
}

/// Inverse of [`to_unix_millis`]; `None` outside chrono's range.
#[must_use]
pub fn from_unix_millis(millis: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_millis(millis)
}
