//! Batched, concurrent upserts.
//!
//! [`BatchWriter`] cuts a row set into fixed-size batches and hands each one to
//! an [`UpsertSink`] in its own task, with at most `max_in_flight` batches
//! talking to the store at once. A failed batch is logged and reported; it
//! never stops its siblings. The caller decides what a partial write means by
//! inspecting the returned [`WriteReport`].

use std::{collections::HashMap, fmt, ops::Range, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};

use crate::error::{PipelineError, StoreError};

/// What to do when a row with the same natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Replace the stored non-key fields with the new values.
    #[default]
    Overwrite,
    /// Keep the stored row untouched.
    Ignore,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeMode::Overwrite => "overwrite",
            MergeMode::Ignore => "ignore",
        })
    }
}

impl FromStr for MergeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" | "update" => Ok(MergeMode::Overwrite),
            "ignore" | "nothing" => Ok(MergeMode::Ignore),
            other => Err(format!("unknown merge mode {other:?} (expected overwrite or ignore)")),
        }
    }
}

/// Write side of the storage contract for one record type.
///
/// One call is one multi-row statement keyed on the record's natural key.
/// Implementations must not share a connection between concurrent calls.
#[async_trait]
pub trait UpsertSink<R: Send + Sync + 'static>: Send + Sync {
    /// Upsert `rows`, resolving conflicts per `mode`. Returns rows affected.
    async fn upsert_batch(&self, rows: &[R], mode: MergeMode) -> Result<usize, StoreError>;
}

/// A batch that did not make it to the store.
#[derive(Debug)]
pub struct BatchFailure {
    /// positions of the batch's rows in the input sequence
    pub rows: Range<usize>,
    pub error: String,
}

/// Outcome of [`BatchWriter::write_all`].
#[derive(Debug, Default)]
pub struct WriteReport {
    pub attempted: usize,
    /// rows in batches that committed
    pub written: usize,
    /// rows the store reported as inserted or changed, `<= written`
    pub affected: usize,
    pub failed: Vec<BatchFailure>, // ordered by position
}

impl WriteReport {
    /// True when every batch committed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn a partial write into [`PipelineError::Write`].
    pub fn ensure_complete(&self) -> Result<(), PipelineError> {
        if self.is_complete() {
            return Ok(());
        }
        Err(PipelineError::Write {
            failed_batches: self.failed.len(),
            failed_rows: self.failed.iter().map(|f| f.rows.len()).sum(),
        })
    }
}

/// Splits rows into batches and writes them concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWriter {
    batch_size: usize,
    max_in_flight: usize,
}

impl BatchWriter {
    /// Zero values are treated as one.
    pub fn new(batch_size: usize, max_in_flight: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Rows per statement.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write every row of `rows` through `sink`.
    pub async fn write_all<R, S>(&self, sink: Arc<S>, rows: Vec<R>, mode: MergeMode) -> WriteReport
    where
        R: Send + Sync + 'static,
        S: UpsertSink<R> + ?Sized + 'static,
    {
        let mut report = WriteReport {
            attempted: rows.len(),
            ..WriteReport::default()
        };
        if rows.is_empty() {
            return report;
        }

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();

        for (range, batch) in partition(rows, self.batch_size) {
            let sink = Arc::clone(&sink);
            let permits = Arc::clone(&permits);
            let span = range.clone();
            let handle = tasks.spawn(async move {
                // never closed; a missing permit only means the ceiling is lifted
                let _permit = permits.acquire_owned().await.ok();
                let outcome = sink.upsert_batch(&batch, mode).await;
                (span, outcome)
            });
            pending.insert(handle.id(), range);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (range, Ok(affected)))) => {
                    pending.remove(&id);
                    debug!(rows = ?range, affected, "batch committed");
                    report.written += range.len();
                    report.affected += affected;
                }
                Ok((id, (range, Err(err)))) => {
                    pending.remove(&id);
                    warn!(rows = ?range, %mode, error = %err, "batch write failed");
                    report.failed.push(BatchFailure {
                        rows: range,
                        error: err.to_string(),
                    });
                }
                Err(join_err) => {
                    let rows = pending.remove(&join_err.id()).unwrap_or(0..0);
                    warn!(rows = ?rows, error = %join_err, "batch task failed");
                    report.failed.push(BatchFailure {
                        rows,
                        error: join_err.to_string(),
                    });
                }
            }
        }

        report.failed.sort_by_key(|f| f.rows.start);
        report
    }
}

/// Cut `rows` into consecutive batches of at most `size`, remembering where each came from.
fn partition<R>(rows: Vec<R>, size: usize) -> Vec<(Range<usize>, Vec<R>)> {
    let size = size.max(1);
    let mut out = Vec::with_capacity(rows.len().div_ceil(size));
    let mut rest = rows.into_iter();
    let mut start = 0;
    loop {
        let batch: Vec<R> = rest.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        let end = start + batch.len();
        out.push((start..end, batch));
        start = end;
    }
    out
}
