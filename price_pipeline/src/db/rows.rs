//! Insertable shapes of the pipeline's records.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    models::{Candle, LiveStat, PriceObservation},
    schema::{item_price_candle, item_price_history, live_stats},
};

#[derive(Insertable)]
#[diesel(table_name = item_price_history)]
pub(super) struct HistoryRow {
    pub item_id: i32,
    pub price: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<&PriceObservation> for HistoryRow {
    fn from(o: &PriceObservation) -> Self {
        Self {
            item_id: o.item_id,
            price: o.price,
            timestamp: o.observed_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = item_price_candle)]
pub(super) struct CandleRow {
    pub interval: String,
    pub item_id: i32,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub timestamp: DateTime<Utc>,
}

impl From<&Candle> for CandleRow {
    fn from(c: &Candle) -> Self {
        Self {
            interval: c.interval.code().to_string(),
            item_id: c.item_id,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            timestamp: c.bucket_start,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = live_stats)]
pub(super) struct LiveStatRow {
    pub item_id: i32,
    pub last_known_price: i64,
    pub opening_price: i64,
    pub highest_price_today: i64,
    pub lowest_price_today: i64,
    pub supply: i64,
}

impl From<&LiveStat> for LiveStatRow {
    fn from(s: &LiveStat) -> Self {
        Self {
            item_id: s.item_id,
            last_known_price: s.last_known_price,
            opening_price: s.opening_price,
            highest_price_today: s.highest_price_today,
            lowest_price_today: s.lowest_price_today,
            supply: s.supply,
        }
    }
}
