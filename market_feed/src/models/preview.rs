//! Snapshot of current prices for the whole item catalog.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Response of the `marketPreview` request.
///
/// `data` is keyed by `"item<N>"`; `last_updated` is a Unix timestamp in
/// milliseconds shared by every price in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPreview {
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
    pub data: IndexMap<String, i64>,
}

impl MarketPreview {
    /// Snapshot instant truncated to whole seconds.
    ///
    /// Returns `None` if `last_updated` is outside chrono's representable range.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_updated.div_euclid(1000), 0)
    }

    /// `(item_id, price)` pairs for every well-formed key with an id below
    /// `catalog_size`, in ascending item order.
    pub fn item_prices(&self, catalog_size: u32) -> Vec<(i32, i64)> {
        let mut out: Vec<(i32, i64)> = self
            .data
            .iter()
            .filter_map(|(key, price)| {
                let id = parse_item_key(key)?;
                if (id as u32) < catalog_size {
                    Some((id, *price))
                } else {
                    tracing::debug!(key = %key, "preview key outside catalog, skipped");
                    None
                }
            })
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }
}

/// `"item42"` -> `Some(42)`.
fn parse_item_key(key: &str) -> Option<i32> {
    let digits = key.strip_prefix("item")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        tracing::debug!(key = %key, "unrecognised preview key, skipped");
        return None;
    }
    digits.parse().ok()
}
