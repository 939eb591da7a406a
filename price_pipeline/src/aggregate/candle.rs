//! Order-independent OHLC bucketing.
//!
//! Every observation maps to one `(item_id, bucket_start)` key. The first
//! observation for a key opens the candle; later ones widen high/low and move
//! open/close only when they are strictly earlier/later than what the candle
//! already holds. When two observations share the exact same instant the open
//! keeps the lower price and the close keeps the higher one, which makes the
//! result independent of arrival order. Because of that, per-page books can be
//! built in parallel and merged afterwards with [`CandleBook::merge`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    bucket::bucket_start,
    interval::Interval,
    models::{Candle, PriceObservation},
};

/// Grouping key of a candle within one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandleKey {
    /// catalog item id
    pub item_id: i32,
    /// bucket start, UTC
    pub bucket_start: DateTime<Utc>,
}

impl Candle {
    /// Candle holding exactly one observation.
    pub fn opened_by(interval: Interval, obs: &PriceObservation) -> Self {
        Candle {
            item_id: obs.item_id,
            interval,
            bucket_start: bucket_start(obs.observed_at, interval),
            open: obs.price,
            high: obs.price,
            low: obs.price,
            close: obs.price,
            open_time: obs.observed_at,
            close_time: obs.observed_at,
        }
    }

    /// Fold one more observation of the same key into the candle.
    pub fn absorb(&mut self, obs: &PriceObservation) {
        self.high = self.high.max(obs.price);
        self.low = self.low.min(obs.price);
        if (obs.observed_at, obs.price) > (self.close_time, self.close) {
            self.close = obs.price;
            self.close_time = obs.observed_at;
        }
        if (obs.observed_at, obs.price) < (self.open_time, self.open) {
            self.open = obs.price;
            self.open_time = obs.observed_at;
        }
    }

    /// Combine two partial candles of the same key.
    pub fn merge(&mut self, other: &Candle) {
        debug_assert_eq!(self.key(), other.key());
        self.high = self.high.max(other.high);
        self.low = self.low.min(other.low);
        if (other.close_time, other.close) > (self.close_time, self.close) {
            self.close = other.close;
            self.close_time = other.close_time;
        }
        if (other.open_time, other.open) < (self.open_time, self.open) {
            self.open = other.open;
            self.open_time = other.open_time;
        }
    }

    /// Grouping key of this candle.
    pub fn key(&self) -> CandleKey {
        CandleKey {
            item_id: self.item_id,
            bucket_start: self.bucket_start,
        }
    }
}

/// In-progress candles for one interval, keyed by item and bucket.
#[derive(Debug, Clone)]
pub struct CandleBook {
    interval: Interval,
    candles: HashMap<CandleKey, Candle>,
}

impl CandleBook {
    /// Empty book for `interval`.
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            candles: HashMap::new(),
        }
    }

    /// Bucket width this book aggregates into.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Fold one observation.
    pub fn fold(&mut self, obs: &PriceObservation) {
        let key = CandleKey {
            item_id: obs.item_id,
            bucket_start: bucket_start(obs.observed_at, self.interval),
        };
        self.candles
            .entry(key)
            .and_modify(|c| c.absorb(obs))
            .or_insert_with(|| Candle::opened_by(self.interval, obs));
    }

    /// Merge another book of the same interval into this one.
    pub fn merge(&mut self, other: CandleBook) {
        debug_assert_eq!(self.interval, other.interval);
        for (key, candle) in other.candles {
            self.candles
                .entry(key)
                .and_modify(|c| c.merge(&candle))
                .or_insert(candle);
        }
    }

    /// Number of distinct (item, bucket) keys.
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// True when nothing has been folded.
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Look up one candle.
    pub fn get(&self, item_id: i32, bucket_start: DateTime<Utc>) -> Option<&Candle> {
        self.candles.get(&CandleKey {
            item_id,
            bucket_start,
        })
    }

    /// All candles, ordered by item then bucket.
    pub fn into_candles(self) -> Vec<Candle> {
        let mut out: Vec<Candle> = self.candles.into_values().collect();
        out.sort_unstable_by_key(Candle::key);
        out
    }
}

impl<'a> Extend<&'a PriceObservation> for CandleBook {
    fn extend<I: IntoIterator<Item = &'a PriceObservation>>(&mut self, iter: I) {
        for obs in iter {
            self.fold(obs);
        }
    }
}

/// Bucket `observations` into candles of `interval`.
pub fn aggregate_candles(interval: Interval, observations: &[PriceObservation]) -> Vec<Candle> {
    let mut book = CandleBook::new(interval);
    book.extend(observations);
    book.into_candles()
}
