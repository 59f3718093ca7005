//! Civil-time helpers over unix-epoch seconds.
//!
//! The engine never reads an ambient clock: every operation that compares
//! durations receives an explicit `UnixTime`. These helpers derive the civil
//! quantities (hour of day, weekday) the load model and detectors need.

/// Timestamp in seconds since the unix epoch (UTC).
pub type UnixTime = i64;

/// Seconds in one day.
pub const DAY_SECS: i64 = 86_400;

/// Seconds in one hour.
pub const HOUR_SECS: i64 = 3_600;

/// Returns the hour of day (0-23) for a timestamp.
pub fn hour_of_day(ts: UnixTime) -> u32 {
    (ts.rem_euclid(DAY_SECS) / HOUR_SECS) as u32
}

/// Returns the hour of day as a fraction, e.g. 08:30 -> 8.5.
pub fn hour_fraction(ts: UnixTime) -> f64 {
    ts.rem_euclid(DAY_SECS) as f64 / HOUR_SECS as f64
}

/// Returns the weekday index, 0 = Monday .. 6 = Sunday.
///
/// The unix epoch (1970-01-01) was a Thursday.
pub fn weekday(ts: UnixTime) -> u32 {
    ((ts.div_euclid(DAY_SECS) + 3).rem_euclid(7)) as u32
}

/// Returns `true` for Saturday and Sunday.
pub fn is_weekend(ts: UnixTime) -> bool {
    weekday(ts) >= 5
}

/// Truncates a timestamp down to the start of its bucket.
///
/// # Panics
///
/// Panics if `bucket_secs` is zero.
pub fn truncate_to_bucket(ts: UnixTime, bucket_secs: i64) -> UnixTime {
    assert!(bucket_secs > 0, "bucket_secs must be > 0");
    ts.div_euclid(bucket_secs) * bucket_secs
}
