//! Read side of the storage contract.
//!
//! [`ObservationSource`] is the narrow interface the extraction and live-stat
//! stages read through. Backends report "nothing there" as `Ok(None)`; the
//! `fetch_*` helpers in this module turn that into [`PipelineError::NotFound`]
//! with the item id attached, so a missing row never turns into a zero.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_feed::{models::MarketListing, providers::MarketDataProvider};

use crate::{
    error::{Lookup, PipelineError, StoreError},
    models::{PriceObservation, PriceRange},
    tz::DayWindow,
};

/// One slice of the extraction result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub index: usize, // zero-based
    pub offset: u64,
    pub limit: u32,
}

/// Split `total` rows into pages of `page_size`. The last page may be short.
pub fn plan_pages(total: u64, page_size: u32) -> Vec<PageRequest> {
    let size = u64::from(page_size.max(1));
    (0..total.div_ceil(size))
        .map(|i| PageRequest {
            index: i as usize,
            offset: i * size,
            limit: page_size.max(1),
        })
        .collect()
}

/// Price history as seen by the pipeline.
///
/// Pages must be returned in a stable order (item id ascending, timestamp
/// descending) so that concurrent pages with different offsets partition the
/// result set without overlap.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Rows observed at or after `cutoff`.
    async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// One page of rows observed at or after `cutoff`.
    async fn fetch_page(
        &self,
        cutoff: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Vec<PriceObservation>, StoreError>;

    /// Most recent price recorded for the item before `day` ends. Rows from
    /// earlier days count; rows after `day.end` do not.
    async fn latest_price(&self, item_id: i32, day: DayWindow)
    -> Result<Option<i64>, StoreError>;

    /// Earliest price recorded for the item inside `day`.
    async fn opening_price(&self, item_id: i32, day: DayWindow)
    -> Result<Option<i64>, StoreError>;

    /// Min and max price recorded for the item inside `day`.
    async fn price_range(
        &self,
        item_id: i32,
        day: DayWindow,
    ) -> Result<Option<PriceRange>, StoreError>;
}

/// Size of the extraction set for runs starting at `cutoff`.
pub async fn count_pending<S: ObservationSource + ?Sized>(
    source: &S,
    cutoff: DateTime<Utc>,
) -> Result<u64, PipelineError> {
    Ok(source.count_since(cutoff).await?)
}

/// Latest price recorded up to the end of `day`, or `NotFound`.
pub async fn fetch_latest_price<S: ObservationSource + ?Sized>(
    source: &S,
    item_id: i32,
    day: DayWindow,
) -> Result<i64, PipelineError> {
    source
        .latest_price(item_id, day)
        .await?
        .ok_or(PipelineError::NotFound {
            item_id,
            what: Lookup::LatestPrice,
        })
}

/// Today's opening price, or `NotFound`.
pub async fn fetch_opening_price<S: ObservationSource + ?Sized>(
    source: &S,
    item_id: i32,
    day: DayWindow,
) -> Result<i64, PipelineError> {
    source
        .opening_price(item_id, day)
        .await?
        .ok_or(PipelineError::NotFound {
            item_id,
            what: Lookup::OpeningPrice,
        })
}

/// Today's min/max, or `NotFound`.
pub async fn fetch_price_range<S: ObservationSource + ?Sized>(
    source: &S,
    item_id: i32,
    day: DayWindow,
) -> Result<PriceRange, PipelineError> {
    source
        .price_range(item_id, day)
        .await?
        .ok_or(PipelineError::NotFound {
            item_id,
            what: Lookup::PriceRange,
        })
}

/// Open listings for the item from the market API.
pub async fn fetch_market_listings<P: MarketDataProvider + ?Sized>(
    provider: &P,
    item_id: i32,
) -> Result<Vec<MarketListing>, PipelineError> {
    provider
        .market_listings(item_id)
        .await
        .map_err(|source| PipelineError::ExternalApi { item_id, source })
}
