//! Candle pipeline: extract today's observations, bucket, upsert.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    aggregate::CandleBook,
    config::PipelineConfig,
    coordinator::{ExtractionLimits, extract_observations},
    error::PipelineError,
    interval::Interval,
    models::Candle,
    source::ObservationSource,
    writer::{BatchWriter, MergeMode, UpsertSink, WriteReport},
};

/// Parameters of one candle run.
#[derive(Debug, Clone, Copy)]
pub struct CandleJob {
    pub interval: Interval,
    /// conflict handling for candles already stored
    pub mode: MergeMode,
    /// observations at or after this instant are aggregated
    pub cutoff: DateTime<Utc>,
    pub limits: ExtractionLimits,
    pub writer: BatchWriter,
}

impl CandleJob {
    /// Job using the configured limits.
    pub fn from_config(
        cfg: &PipelineConfig,
        interval: Interval,
        mode: MergeMode,
        cutoff: DateTime<Utc>,
    ) -> Self {
        Self {
            interval,
            mode,
            cutoff,
            limits: cfg.extraction_limits(),
            writer: cfg.batch_writer(),
        }
    }
}

/// Outcome of one candle run.
#[derive(Debug)]
pub struct CandleRunReport {
    pub observations: usize,
    pub pages: usize,
    pub candles: usize,
    pub write: WriteReport,
}

/// Run the candle pipeline.
///
/// Extraction is all-or-nothing: if any page fails, the wait times out or the
/// history drifts between pages, the error is returned and nothing is written. Writing is best effort; failed
/// batches are listed in the report.
pub async fn run_candle_job<S, K>(
    source: Arc<S>,
    sink: Arc<K>,
    job: CandleJob,
) -> Result<CandleRunReport, PipelineError>
where
    S: ObservationSource + ?Sized + 'static,
    K: UpsertSink<Candle> + ?Sized + 'static,
{
    let extraction = extract_observations(source, job.cutoff, job.limits).await?;

    let mut book = CandleBook::new(job.interval);
    book.extend(&extraction.observations);
    let candles = book.into_candles();
    let produced = candles.len();
    info!(interval = %job.interval, candles = produced, "aggregated");

    let write = job.writer.write_all(sink, candles, job.mode).await;
    info!(
        interval = %job.interval,
        mode = %job.mode,
        written = write.written,
        failed_batches = write.failed.len(),
        "candle run finished"
    );
    Ok(CandleRunReport {
        observations: extraction.observations.len(),
        pages: extraction.pages,
        candles: produced,
        write,
    })
}
