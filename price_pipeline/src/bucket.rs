//! UTC bucket mapping
//!
//! Buckets are fixed-width windows counted from the Unix epoch, so hour and day
//! starts are always floored in UTC regardless of the configured day time zone.

use chrono::{DateTime, Duration, Utc};

use crate::interval::Interval;

/// Unix epoch start (1970-01-01T00:00:00Z).
pub const EPOCH_UNIX: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * 60;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Bucket index for a timestamp. Negative before 1970.
pub fn bucket_id(ts_utc: DateTime<Utc>, interval: Interval) -> i64 {
    ts_utc.timestamp().div_euclid(interval.width_secs())
}

/// Start instant of a bucket index.
pub fn bucket_start_of(id: i64, interval: Interval) -> DateTime<Utc> {
    EPOCH_UNIX + Duration::seconds(id * interval.width_secs())
}

/// Floor `ts_utc` to the start of its bucket.
pub fn bucket_start(ts_utc: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    bucket_start_of(bucket_id(ts_utc, interval), interval)
}
