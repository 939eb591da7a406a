//! Row types flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::interval::Interval;

/// One recorded price for one item at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PriceObservation {
    pub item_id: i32,
    pub price: i64,
    pub observed_at: DateTime<Utc>, // UTC, second precision
}

impl PriceObservation {
    /// Convenience constructor.
    pub fn new(item_id: i32, price: i64, observed_at: DateTime<Utc>) -> Self {
        Self {
            item_id,
            price,
            observed_at,
        }
    }
}

/// OHLC summary for one item within one bucket.
///
/// `open_time`/`close_time` track the instants the open and close came from so
/// that partial candles can be merged; they are not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Candle {
    pub item_id: i32,
    pub interval: Interval,
    pub bucket_start: DateTime<Utc>, // floored in UTC
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    #[serde(skip)]
    pub open_time: DateTime<Utc>,
    #[serde(skip)]
    pub close_time: DateTime<Utc>,
}

/// Lowest and highest price over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    pub low: i64,
    pub high: i64,
}

/// Current-day snapshot for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveStat {
    pub item_id: i32,
    /// most recent price recorded before the day ended, possibly from an earlier day
    pub last_known_price: i64,
    pub opening_price: i64,
    pub highest_price_today: i64,
    pub lowest_price_today: i64,
    /// total quantity across current market listings
    pub supply: i64,
}
