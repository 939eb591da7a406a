//! Parsing of the scheduler payload that selects a live-stat batch.
//!
//! The scheduler sends `{"batchNumber": "<n>"}` with the number as a string.
//! Batch `n` covers item ids `n * width ..= n * width + width - 1`.

use std::ops::RangeInclusive;

use serde::Deserialize;

use crate::error::PipelineError;

/// Payload of a live-stat invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveStatPayload {
    /// Decimal batch index, transmitted as a string.
    #[serde(rename = "batchNumber")]
    pub batch_number: String,
}

impl LiveStatPayload {
    /// Decode the raw JSON payload.
    pub fn from_json(raw: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(raw).map_err(|e| PipelineError::InvalidPayload(e.to_string()))
    }

    /// The batch index as a number.
    pub fn batch(&self) -> Result<u32, PipelineError> {
        self.batch_number.trim().parse::<u32>().map_err(|e| {
            PipelineError::InvalidPayload(format!(
                "batchNumber {:?} is not a non-negative integer: {e}",
                self.batch_number
            ))
        })
    }
}

/// Item ids covered by batch `batch` of `width` items.
pub fn item_range(batch: u32, width: u32) -> Result<RangeInclusive<i32>, PipelineError> {
    let width = width.max(1);
    let first = batch
        .checked_mul(width)
        .and_then(|start| i32::try_from(start).ok());
    let last = first
        .zip(i32::try_from(width - 1).ok())
        .and_then(|(start, span)| start.checked_add(span));
    match (first, last) {
        (Some(first), Some(last)) => Ok(first..=last),
        _ => Err(PipelineError::InvalidPayload(format!(
            "batch {batch} of width {width} is out of range"
        ))),
    }
}
