//! Time zone helpers and the "today" window used by live stats.
//!
//! - [`parse_ts_to_utc`]: RFC-3339 with an explicit offset, converted to UTC.
//! - [`from_local_naive`]: local wall time in an IANA zone to UTC, stepping
//!   over DST gaps.
//! - [`DayWindow`]: `[local midnight, next local midnight)` expressed in UTC.
//!
//! Candle buckets never go through this module; they are pure UTC math in
//! [`crate::bucket`]. Only the live-stat "current day" is zone-aware.

use anyhow::Context;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// RFC-3339 with offset -> UTC.
///
/// Example: "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Local wall time in `tz` to UTC.
///
/// An ambiguous time (DST fall-back) resolves to the earlier instant. A time
/// inside a DST gap steps forward one minute at a time, at most two hours,
/// until it exists. `None` only when the gap is longer than that.
pub fn from_local_naive(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Some(dt.with_timezone(&Utc));
    }
    let mut t = naive;
    for _ in 0..120 {
        t += chrono::Duration::minutes(1);
        if let Some(dt) = tz.from_local_datetime(&t).earliest() {
            return Some(dt.with_timezone(&Utc));
        }
    }
    None
}

/// A half-open UTC interval covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// local midnight, in UTC (inclusive)
    pub start: DateTime<Utc>,
    /// next local midnight, in UTC (exclusive)
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The local day in `tz` that contains `now`.
    pub fn containing(now: DateTime<Utc>, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        Self {
            start: local_midnight(today, tz),
            end: local_midnight(tomorrow, tz),
        }
    }

    /// Whether `ts` falls inside the window.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    // a zone whose midnight vanishes for longer than the shift cap falls back to UTC midnight
    from_local_naive(naive, tz).unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
