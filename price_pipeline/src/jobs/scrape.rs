//! Snapshot the market preview into the price history table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use market_feed::providers::MarketDataProvider;
use tracing::{debug, info};

use crate::{
    error::PipelineError,
    models::PriceObservation,
    writer::{BatchWriter, MergeMode, UpsertSink, WriteReport},
};

/// Outcome of one scrape.
#[derive(Debug)]
pub struct ScrapeReport {
    /// `None` when the preview carried no publish time
    pub observed_at: Option<DateTime<Utc>>,
    pub listed: usize, // entries in the preview
    pub kept: usize, // catalog items among them
    pub write: WriteReport,
}

/// Fetch the preview and record one observation per catalog item.
///
/// Rows already present for the same `(item, timestamp)` are left untouched,
/// so scraping an unchanged preview twice is harmless.
pub async fn run_scrape_job<P, K>(
    provider: &P,
    sink: Arc<K>,
    catalog_size: u32,
    writer: BatchWriter,
) -> Result<ScrapeReport, PipelineError>
where
    P: MarketDataProvider + ?Sized,
    K: UpsertSink<PriceObservation> + ?Sized + 'static,
{
    let preview = provider
        .market_preview()
        .await
        .map_err(PipelineError::Market)?;
    let listed = preview.data.len();

    let Some(observed_at) = preview.observed_at() else {
        info!(listed, "preview has no usable timestamp, nothing recorded");
        return Ok(ScrapeReport {
            observed_at: None,
            listed,
            kept: 0,
            write: WriteReport::default(),
        });
    };

    let rows: Vec<PriceObservation> = preview
        .item_prices(catalog_size)
        .into_iter()
        .map(|(item_id, price)| PriceObservation::new(item_id, price, observed_at))
        .collect();
    let kept = rows.len();
    if kept < listed {
        debug!(skipped = listed - kept, "ignored keys outside the catalog");
    }

    let write = writer.write_all(sink, rows, MergeMode::Ignore).await;
    info!(%observed_at, kept, written = write.written, "scrape finished");
    Ok(ScrapeReport {
        observed_at: Some(observed_at),
        listed,
        kept,
        write,
    })
}
