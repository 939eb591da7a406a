//! A single open sell listing on the in-game market.

use serde::{Deserialize, Serialize};

/// One market listing as returned by the `marketListings` request.
///
/// Only `quantity` matters downstream: the live-stat refresh sums it into the
/// item's current supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListing {
    /// Item identifier.
    #[serde(rename = "id")]
    pub item_id: i32,
    /// Asking price per unit.
    pub price: i64,
    /// Units offered by this listing.
    #[serde(rename = "amount")]
    pub quantity: i64,
}

/// Total units on offer across `listings`.
pub fn total_supply(listings: &[MarketListing]) -> i64 {
    listings.iter().map(|l| l.quantity).sum()
}
