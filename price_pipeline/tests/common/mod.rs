#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use market_feed::{
    models::{MarketListing, MarketPreview},
    providers::{ApiSnafu, MarketDataProvider, ProviderError},
};
use price_pipeline::{
    error::StoreError,
    interval::Interval,
    models::{Candle, LiveStat, PriceObservation, PriceRange},
    source::{ObservationSource, PageRequest},
    tz::DayWindow,
    writer::{MergeMode, UpsertSink},
};

/// 2024-05-01 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
}

pub fn obs(item_id: i32, price: i64, observed_at: DateTime<Utc>) -> PriceObservation {
    PriceObservation::new(item_id, price, observed_at)
}

/// Tracks how many calls are running at once and the highest value seen.
#[derive(Default)]
pub struct Gauge {
    now: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn enter(&self) {
        let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.now.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

type CandleSlot = (i32, DateTime<Utc>, Interval);

/// In-memory stand-in for the Postgres store.
///
/// Failure knobs are plain fields; set them before wrapping the store in an `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    history: Mutex<Vec<PriceObservation>>,
    candles: Mutex<BTreeMap<CandleSlot, Candle>>,
    live: Mutex<BTreeMap<i32, LiveStat>>,

    /// page indexes that return an error
    pub failing_pages: HashSet<usize>,
    /// page indexes that never complete
    pub stalled_pages: HashSet<usize>,
    /// delay before every page returns
    pub page_delay: Option<Duration>,
    /// candle/live-stat batches containing this item id fail
    pub poisoned_item: Option<i32>,
    /// a row that lands in history right after the given page is served
    pub late_row: Mutex<Option<(usize, PriceObservation)>>,

    pub pages: Gauge,
    pub page_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_history(rows: impl IntoIterator<Item = PriceObservation>) -> Self {
        let store = Self::default();
        store.record(rows);
        store
    }

    /// Append observations, keeping the (item asc, time desc) page order.
    pub fn record(&self, rows: impl IntoIterator<Item = PriceObservation>) {
        let mut history = self.history.lock().unwrap();
        history.extend(rows);
        history.sort_by(|a, b| {
            a.item_id
                .cmp(&b.item_id)
                .then(b.observed_at.cmp(&a.observed_at))
                .then(a.price.cmp(&b.price))
        });
    }

    pub fn history(&self) -> Vec<PriceObservation> {
        self.history.lock().unwrap().clone()
    }

    pub fn candles(&self) -> Vec<Candle> {
        self.candles.lock().unwrap().values().copied().collect()
    }

    pub fn candle(&self, item_id: i32, bucket: DateTime<Utc>, interval: Interval) -> Option<Candle> {
        self.candles
            .lock()
            .unwrap()
            .get(&(item_id, bucket, interval))
            .copied()
    }

    pub fn live_stats(&self) -> BTreeMap<i32, LiveStat> {
        self.live.lock().unwrap().clone()
    }

    fn poisoned(&self, ids: impl IntoIterator<Item = i32>) -> Result<(), StoreError> {
        match self.poisoned_item {
            Some(p) if ids.into_iter().any(|id| id == p) => {
                Err(StoreError::Backend(format!("rejected batch containing item {p}")))
            }
            _ => Ok(()),
        }
    }

    fn today(&self, item_id: i32, day: DayWindow) -> Vec<PriceObservation> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.item_id == item_id && day.contains(o.observed_at))
            .copied()
            .collect()
    }
}

#[async_trait]
impl ObservationSource for MemoryStore {
    async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let history = self.history.lock().unwrap();
        Ok(history.iter().filter(|o| o.observed_at >= cutoff).count() as u64)
    }

    async fn fetch_page(
        &self,
        cutoff: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Vec<PriceObservation>, StoreError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.pages.enter();
        if self.stalled_pages.contains(&page.index) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }
        self.pages.exit();
        if self.failing_pages.contains(&page.index) {
            return Err(StoreError::Backend(format!("page {} lost its connection", page.index)));
        }
        let rows: Vec<_> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.observed_at >= cutoff)
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .copied()
            .collect();
        let mut late = self.late_row.lock().unwrap();
        if late.is_some_and(|(after, _)| after == page.index) {
            if let Some((_, row)) = late.take() {
                self.record([row]);
            }
        }
        Ok(rows)
    }

    async fn latest_price(&self, item_id: i32, day: DayWindow) -> Result<Option<i64>, StoreError> {
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .filter(|o| o.item_id == item_id && o.observed_at < day.end)
            .max_by_key(|o| o.observed_at)
            .map(|o| o.price))
    }

    async fn opening_price(&self, item_id: i32, day: DayWindow) -> Result<Option<i64>, StoreError> {
        Ok(self
            .today(item_id, day)
            .into_iter()
            .min_by_key(|o| o.observed_at)
            .map(|o| o.price))
    }

    async fn price_range(
        &self,
        item_id: i32,
        day: DayWindow,
    ) -> Result<Option<PriceRange>, StoreError> {
        let today = self.today(item_id, day);
        let low = today.iter().map(|o| o.price).min();
        let high = today.iter().map(|o| o.price).max();
        Ok(low.zip(high).map(|(low, high)| PriceRange { low, high }))
    }
}

#[async_trait]
impl UpsertSink<Candle> for MemoryStore {
    async fn upsert_batch(&self, rows: &[Candle], mode: MergeMode) -> Result<usize, StoreError> {
        self.poisoned(rows.iter().map(|c| c.item_id))?;
        let mut stored = self.candles.lock().unwrap();
        let mut affected = 0;
        for c in rows {
            let slot = (c.item_id, c.bucket_start, c.interval);
            match mode {
                MergeMode::Overwrite => {
                    stored.insert(slot, *c);
                    affected += 1;
                }
                MergeMode::Ignore => {
                    if !stored.contains_key(&slot) {
                        stored.insert(slot, *c);
                        affected += 1;
                    }
                }
            }
        }
        Ok(affected)
    }
}

#[async_trait]
impl UpsertSink<LiveStat> for MemoryStore {
    async fn upsert_batch(&self, rows: &[LiveStat], mode: MergeMode) -> Result<usize, StoreError> {
        self.poisoned(rows.iter().map(|s| s.item_id))?;
        let mut stored = self.live.lock().unwrap();
        let mut affected = 0;
        for s in rows {
            if mode == MergeMode::Ignore && stored.contains_key(&s.item_id) {
                continue;
            }
            stored.insert(s.item_id, *s);
            affected += 1;
        }
        Ok(affected)
    }
}

#[async_trait]
impl UpsertSink<PriceObservation> for MemoryStore {
    async fn upsert_batch(
        &self,
        rows: &[PriceObservation],
        mode: MergeMode,
    ) -> Result<usize, StoreError> {
        let mut fresh = Vec::new();
        {
            let mut history = self.history.lock().unwrap();
            for o in rows {
                let existing = history
                    .iter_mut()
                    .find(|h| h.item_id == o.item_id && h.observed_at == o.observed_at);
                match (existing, mode) {
                    (Some(h), MergeMode::Overwrite) => h.price = o.price,
                    (Some(_), MergeMode::Ignore) => continue,
                    (None, _) => fresh.push(*o),
                }
            }
        }
        let affected = fresh.len();
        self.record(fresh);
        Ok(affected)
    }
}

/// Scripted market API.
#[derive(Default)]
pub struct FakeMarket {
    pub listings: HashMap<i32, Vec<MarketListing>>,
    pub failing: HashSet<i32>,
    pub preview: Option<MarketPreview>,
    /// delay before every listings reply
    pub delay: Option<Duration>,
    pub calls: Gauge,
}

impl FakeMarket {
    pub fn with_supply(items: impl IntoIterator<Item = (i32, Vec<i64>)>) -> Self {
        let listings = items
            .into_iter()
            .map(|(item_id, quantities)| {
                let rows = quantities
                    .into_iter()
                    .map(|quantity| MarketListing {
                        item_id,
                        price: 100,
                        quantity,
                    })
                    .collect();
                (item_id, rows)
            })
            .collect();
        Self {
            listings,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MarketDataProvider for FakeMarket {
    async fn market_listings(&self, item_id: i32) -> Result<Vec<MarketListing>, ProviderError> {
        self.calls.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.exit();
        if self.failing.contains(&item_id) {
            return Err(ApiSnafu {
                status: 502u16,
                body: format!("upstream hiccup for item {item_id}"),
            }
            .build());
        }
        Ok(self.listings.get(&item_id).cloned().unwrap_or_default())
    }

    async fn market_preview(&self) -> Result<MarketPreview, ProviderError> {
        match &self.preview {
            Some(preview) => Ok(preview.clone()),
            None => Err(ApiSnafu {
                status: 503u16,
                body: "preview unavailable",
            }
            .build()),
        }
    }
}
