//! Fan-out/fan-in for the extraction stages.
//!
//! - [`extract_observations`]: pages of raw observations, fetched by a bounded
//!   worker pool under one global deadline. First error wins; on error or
//!   timeout the remaining tasks are aborted and nothing is returned. A
//!   history that moved underneath the pages fails as [`PipelineError::Drift`].
//! - [`gather_item_inputs`]: the four per-item lookups, run concurrently.
//! - [`refresh_items`]: per-item refreshes behind a strict concurrency ceiling.
//!   Item failures are collected, not propagated.

use std::{
    collections::{HashMap, HashSet},
    ops::RangeInclusive,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use market_feed::providers::MarketDataProvider;
use tokio::{
    sync::Semaphore,
    task::JoinSet,
    time::{Instant, timeout_at},
};
use tracing::{debug, info, warn};

use crate::{
    aggregate::{LiveStatInputs, build_live_stat},
    error::{PipelineError, StoreError},
    models::{LiveStat, PriceObservation},
    source::{
        ObservationSource, PageRequest, count_pending, fetch_latest_price, fetch_market_listings,
        fetch_opening_price, fetch_price_range, plan_pages,
    },
    tz::DayWindow,
};

/// Knobs for [`extract_observations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    pub page_size: u32,
    /// pages fetched at once
    pub page_workers: usize,
    /// one deadline for the whole extraction, not per page
    pub wait_timeout: Duration,
}

/// Everything a successful extraction produced.
#[derive(Debug, Default)]
pub struct Extraction {
    pub expected: u64,
    pub pages: usize,
    /// distinct rows of all pages, in completion order
    pub observations: Vec<PriceObservation>,
}

type PageOutcome = (PageRequest, Result<Vec<PriceObservation>, StoreError>);

/// Fetch every observation at or after `cutoff`.
///
/// The result set is sized once, split into pages and fetched by at most
/// `page_workers` tasks. Completion is tracked per page task, independent of
/// how many rows each page returned. The whole wait is bounded by
/// `wait_timeout`; when it expires every in-flight task is aborted and
/// [`PipelineError::Timeout`] is returned.
///
/// Offset pages shift when rows land inside the range between two page
/// fetches, so a row can be read twice while another is never read. Rows are
/// deduplicated on `(item_id, observed_at)`. The distinct count and a second
/// count taken after the last page must both equal the first count, otherwise
/// the run fails with [`PipelineError::Drift`].
pub async fn extract_observations<S>(
    source: Arc<S>,
    cutoff: DateTime<Utc>,
    limits: ExtractionLimits,
) -> Result<Extraction, PipelineError>
where
    S: ObservationSource + ?Sized + 'static,
{
    let expected = count_pending(source.as_ref(), cutoff).await?;
    let pages = plan_pages(expected, limits.page_size);
    let total = pages.len();
    info!(%cutoff, expected, pages = total, "extracting observations");
    if total == 0 {
        return Ok(Extraction::default());
    }

    let started = Instant::now();
    let deadline = started + limits.wait_timeout;
    let mut queue = pages.into_iter();
    let mut inflight: JoinSet<PageOutcome> = JoinSet::new();
    for page in queue.by_ref().take(limits.page_workers.max(1)) {
        spawn_page(&mut inflight, Arc::clone(&source), cutoff, page);
    }

    let mut observations = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
    let mut seen = HashSet::with_capacity(observations.capacity());
    let mut duplicates = 0usize;
    let mut completed = 0;
    while completed < total {
        let joined = match timeout_at(deadline, inflight.join_next()).await {
            Ok(Some(joined)) => joined,
            Ok(None) => break,
            Err(_) => {
                inflight.abort_all();
                warn!(completed, total, "extraction timed out");
                return Err(PipelineError::Timeout {
                    waited: started.elapsed(),
                    completed,
                    total,
                });
            }
        };
        let (page, rows) = joined?;
        let rows = rows.map_err(|source| PipelineError::Page {
            page: page.index,
            offset: page.offset,
            source,
        })?;
        debug!(page = page.index, rows = rows.len(), "page done");
        for row in rows {
            if seen.insert((row.item_id, row.observed_at)) {
                observations.push(row);
            } else {
                duplicates += 1;
            }
        }
        completed += 1;

        if let Some(next) = queue.next() {
            spawn_page(&mut inflight, Arc::clone(&source), cutoff, next);
        }
    }

    let read = observations.len() as u64;
    let recount = count_pending(source.as_ref(), cutoff).await?;
    if read != expected || recount != expected {
        warn!(expected, read, recount, duplicates, "extraction drifted");
        return Err(PipelineError::Drift {
            expected,
            read,
            recount,
        });
    }

    info!(
        rows = observations.len(),
        pages = completed,
        elapsed = ?started.elapsed(),
        "extraction complete"
    );
    Ok(Extraction {
        expected,
        pages: completed,
        observations,
    })
}

fn spawn_page<S>(
    inflight: &mut JoinSet<PageOutcome>,
    source: Arc<S>,
    cutoff: DateTime<Utc>,
    page: PageRequest,
) where
    S: ObservationSource + ?Sized + 'static,
{
    inflight.spawn(async move { (page, source.fetch_page(cutoff, page).await) });
}

/// Run the four lookups for one item concurrently. Any failure fails the item.
pub async fn gather_item_inputs<S, P>(
    source: &S,
    provider: &P,
    item_id: i32,
    day: DayWindow,
) -> Result<LiveStatInputs, PipelineError>
where
    S: ObservationSource + ?Sized,
    P: MarketDataProvider + ?Sized,
{
    let (latest, opening, range, listings) = tokio::try_join!(
        fetch_latest_price(source, item_id, day),
        fetch_opening_price(source, item_id, day),
        fetch_price_range(source, item_id, day),
        fetch_market_listings(provider, item_id),
    )?;
    Ok(LiveStatInputs {
        latest,
        opening,
        range,
        listings,
    })
}

/// One item that could not be refreshed.
#[derive(Debug)]
pub struct ItemFailure {
    pub item_id: i32,
    pub error: PipelineError,
}

/// Result of a live-stat sweep over a range of items.
#[derive(Debug, Default)]
pub struct ItemSweep {
    pub requested: usize,
    pub stats: Vec<LiveStat>, // sorted by item id
    pub failed: Vec<ItemFailure>, // sorted by item id
}

/// Refresh every item in `items`, at most `concurrency` at a time.
///
/// The spawning loop waits for a free slot before starting the next item, so
/// no more than `concurrency` items are ever in flight.
pub async fn refresh_items<S, P>(
    source: Arc<S>,
    provider: Arc<P>,
    items: RangeInclusive<i32>,
    day: DayWindow,
    concurrency: usize,
) -> ItemSweep
where
    S: ObservationSource + ?Sized + 'static,
    P: MarketDataProvider + ?Sized + 'static,
{
    let slots = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut spawned: HashMap<tokio::task::Id, i32> = HashMap::new();

    for item_id in items {
        // the semaphore is never closed
        let Ok(slot) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        let source = Arc::clone(&source);
        let provider = Arc::clone(&provider);
        let handle = tasks.spawn(async move {
            let _slot = slot;
            let inputs = gather_item_inputs(source.as_ref(), provider.as_ref(), item_id, day).await;
            (item_id, inputs.map(|inputs| build_live_stat(item_id, &inputs)))
        });
        spawned.insert(handle.id(), item_id);
    }

    let mut sweep = ItemSweep {
        requested: spawned.len(),
        ..ItemSweep::default()
    };
    while let Some(joined) = tasks.join_next_with_id().await {
        let (item_id, outcome) = match joined {
            Ok((_, done)) => done,
            Err(join_err) => {
                let item_id = spawned.get(&join_err.id()).copied().unwrap_or(-1);
                (item_id, Err(PipelineError::TaskJoin(join_err)))
            }
        };
        match outcome {
            Ok(stat) => {
                debug!(item_id, "item refreshed");
                sweep.stats.push(stat);
            }
            Err(error) => {
                warn!(item_id, %error, "item refresh failed");
                sweep.failed.push(ItemFailure { item_id, error });
            }
        }
    }

    sweep.stats.sort_unstable_by_key(|s| s.item_id);
    sweep.failed.sort_unstable_by_key(|f| f.item_id);
    sweep
}
