//! Conversion from timestamps to fractional hours since local midnight.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, TimeZone, Timelike};

const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;

/// Largest value the deriver returns. Times in the last 1.8 seconds of the day
/// would otherwise round up to `24.0`, which no bin accepts.
const LAST_FRACTIONAL_HOUR: f64 = 23.999;

/// Converts a wall-clock time into hours since midnight of its own day,
/// rounded to 3 decimals (13:30 -> 13.5, 15:45 -> 15.75).
///
/// The result is always in `[0, 24)`.
pub fn fractional_hour<Tz: TimeZone>(dt: &DateTime<Tz>) -> f64 {
    let seconds = f64::from(dt.num_seconds_from_midnight());
    let hours = (seconds / SECONDS_PER_HOUR * 1000.0).round() / 1000.0;
    hours.min(LAST_FRACTIONAL_HOUR)
}

/// Like [`fractional_hour`] for a unix timestamp in seconds, using the local time zone.
///
/// # Errors
///
/// Returns an error if `timestamp` is outside the range chrono can represent.
pub fn fractional_hour_from_timestamp(timestamp: i64) -> Result<f64> {
    let dt = Local
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| anyhow!("timestamp {timestamp} cannot be represented in local time"))?;
    Ok(fractional_hour(&dt))
}
