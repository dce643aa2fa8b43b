//! Timestamp utilities
//!
//! Every station crawled by this workspace broadcasts on Vienna wall-clock
//! time. Sources that only publish a time of day are resolved against this
//! zone, and the ledger fallback mark is computed in it as well.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Reference timezone for station clocks
pub const REFERENCE_TZ: Tz = chrono_tz::Europe::Vienna;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current wall-clock time in the reference timezone
pub fn now_in_reference_tz() -> DateTime<Tz> {
    now().with_timezone(&REFERENCE_TZ)
}

/// Convert epoch seconds into a reference-timezone datetime
pub fn from_timestamp(timestamp: i64) -> Result<DateTime<Tz>> {
    REFERENCE_TZ
        .timestamp_opt(timestamp, 0)
        .single()
        .ok_or_else(|| Error::Time(format!("timestamp {} out of range", timestamp)))
}

/// Combine a calendar date and a time of day in the reference timezone
///
/// Ambiguous wall-clock times (the repeated hour when DST ends) resolve to
/// the earlier instant. Times inside the spring-forward gap do not exist and
/// are reported as errors.
pub fn local_timestamp(date: NaiveDate, time_of_day: NaiveTime) -> Result<i64> {
    let naive = date.and_time(time_of_day);
    REFERENCE_TZ
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| Error::Time(format!("`{}` does not exist in {}", naive, REFERENCE_TZ)))
}

/// 23:59:59 of the day before `now`'s calendar day, in the reference timezone
///
/// Used as the high-water mark when a station has no ledger history yet, so a
/// first crawl picks up everything aired today.
pub fn previous_day_end(now: DateTime<Utc>) -> Result<i64> {
    let today = now.with_timezone(&REFERENCE_TZ).date_naive();
    let yesterday = today
        .pred_opt()
        .ok_or_else(|| Error::Time(format!("no day before {}", today)))?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| Error::Time("invalid end-of-day time".to_string()))?;
    local_timestamp(yesterday, end_of_day)
}
