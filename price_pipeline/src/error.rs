//! Error taxonomy for pipeline runs.
//!
//! [`StoreError`] is what the storage layer returns; [`PipelineError`] is what
//! a stage surfaces to the coordinator, with enough context attached (item id,
//! page number, elapsed wait) that a single log line identifies the failure.

use std::time::Duration;

use diesel_async::pooled_connection::deadpool::PoolError;
use market_feed::providers::ProviderError;
use thiserror::Error;

/// Failures raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No pooled connection could be checked out.
    #[error("connection pool: {0}")]
    Pool(String),

    /// The statement itself failed.
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// Backend-specific failure that has no structured form (used by in-memory stores).
    #[error("{0}")]
    Backend(String),
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

/// What a lookup was looking for when it came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Most recent recorded price.
    LatestPrice,
    /// First price recorded inside the current day.
    OpeningPrice,
    /// Min/max of today's prices.
    PriceRange,
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Lookup::LatestPrice => "latest price",
            Lookup::OpeningPrice => "opening price",
            Lookup::PriceRange => "daily price range",
        })
    }
}

/// Errors surfaced by pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required lookup matched no rows.
    #[error("no {what} recorded for item {item_id}")]
    NotFound { item_id: i32, what: Lookup },

    /// The market API failed for one item.
    #[error("market api failed for item {item_id}: {source}")]
    ExternalApi {
        item_id: i32,
        #[source]
        source: ProviderError,
    },

    /// The market API failed for a catalog-wide request.
    #[error("market api failed: {0}")]
    Market(#[source] ProviderError),

    /// Not every extraction task reported back before the global wait expired.
    #[error("gave up after {waited:?}: {completed} of {total} pages reported back")]
    Timeout {
        waited: Duration,
        completed: usize, // successful pages only
        total: usize,
    },

    /// One extraction page failed.
    #[error("page {page} (offset {offset}) failed: {source}")]
    Page {
        page: usize,
        offset: u64,
        #[source]
        source: StoreError,
    },

    /// The history changed while it was being paged through.
    ///
    /// Offset pages shift when rows are inserted or removed between two page
    /// fetches, so what was read is not a consistent snapshot. Retrying the
    /// run is safe.
    #[error(
        "extraction drifted: counted {expected} rows up front, read {read} distinct, {recount} present after"
    )]
    Drift {
        expected: u64,
        read: u64,
        recount: u64,
    },

    /// Some write batches were not committed.
    #[error("{failed_batches} write batch(es) failed, {failed_rows} row(s) not written")]
    Write {
        failed_batches: usize,
        failed_rows: usize,
    },

    /// Some items in a live-stat sweep failed.
    #[error("{failed} of {requested} item(s) failed")]
    Items { failed: usize, requested: usize },

    /// Direct storage failure outside a paged extraction.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A spawned task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// The invocation payload could not be understood.
    #[error("invalid invocation payload: {0}")]
    InvalidPayload(String),
}
