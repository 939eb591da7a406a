//! Live-stat assembly from the four per-item lookups.

use market_feed::models::{MarketListing, total_supply};

use crate::models::{LiveStat, PriceRange};

/// Everything fetched for one item before it can be summarised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStatInputs {
    /// most recent recorded price
    pub latest: i64,
    /// first price recorded today
    pub opening: i64,
    /// today's min/max
    pub range: PriceRange,
    /// open market listings
    pub listings: Vec<MarketListing>,
}

/// Merge the lookups into one snapshot. Supply is the summed listing quantity.
pub fn build_live_stat(item_id: i32, inputs: &LiveStatInputs) -> LiveStat {
    LiveStat {
        item_id,
        last_known_price: inputs.latest,
        opening_price: inputs.opening,
        highest_price_today: inputs.range.high,
        lowest_price_today: inputs.range.low,
        supply: total_supply(&inputs.listings),
    }
}
