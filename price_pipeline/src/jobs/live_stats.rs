//! Live-stat refresh for one batch of items.

use std::{ops::RangeInclusive, sync::Arc};

use market_feed::providers::MarketDataProvider;
use tracing::info;

use crate::{
    config::PipelineConfig,
    coordinator::{ItemFailure, refresh_items},
    error::PipelineError,
    models::LiveStat,
    source::ObservationSource,
    tz::DayWindow,
    writer::{BatchWriter, MergeMode, UpsertSink, WriteReport},
};

/// Parameters of one live-stat refresh.
#[derive(Debug, Clone)]
pub struct LiveStatJob {
    pub items: RangeInclusive<i32>,
    /// the day "opening" and "today" refer to
    pub day: DayWindow,
    pub concurrency: usize, // items in flight at once
    pub writer: BatchWriter,
}

impl LiveStatJob {
    /// Job using the configured limits.
    pub fn from_config(cfg: &PipelineConfig, items: RangeInclusive<i32>, day: DayWindow) -> Self {
        Self {
            items,
            day,
            concurrency: cfg.item_concurrency,
            writer: cfg.batch_writer(),
        }
    }
}

/// Outcome of one refresh.
#[derive(Debug)]
pub struct LiveStatRunReport {
    pub requested: usize,
    pub refreshed: usize,
    pub failed: Vec<ItemFailure>,
    pub write: WriteReport,
}

impl LiveStatRunReport {
    /// Error if any item or batch failed.
    pub fn ensure_complete(&self) -> Result<(), PipelineError> {
        if !self.failed.is_empty() {
            return Err(PipelineError::Items {
                failed: self.failed.len(),
                requested: self.requested,
            });
        }
        self.write.ensure_complete()
    }
}

/// Refresh every item in the job's range and upsert the snapshots.
///
/// Items fail independently: a failed lookup skips that item only. Snapshots
/// always overwrite the stored row for the item.
pub async fn run_live_stat_job<S, P, K>(
    source: Arc<S>,
    provider: Arc<P>,
    sink: Arc<K>,
    job: LiveStatJob,
) -> LiveStatRunReport
where
    S: ObservationSource + ?Sized + 'static,
    P: MarketDataProvider + ?Sized + 'static,
    K: UpsertSink<LiveStat> + ?Sized + 'static,
{
    let sweep = refresh_items(source, provider, job.items.clone(), job.day, job.concurrency).await;
    let refreshed = sweep.stats.len();
    let write = job
        .writer
        .write_all(sink, sweep.stats, MergeMode::Overwrite)
        .await;
    info!(
        first = job.items.start(),
        last = job.items.end(),
        requested = sweep.requested,
        refreshed,
        failed = sweep.failed.len(),
        written = write.written,
        "live-stat refresh finished"
    );
    LiveStatRunReport {
        requested: sweep.requested,
        refreshed,
        failed: sweep.failed,
        write,
    }
}
