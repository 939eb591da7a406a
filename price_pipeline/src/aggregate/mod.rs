//! Reducers that turn raw inputs into the rows the pipeline writes.
//!
//! - [`candle`]: folds price observations into per-(item, bucket) OHLC candles.
//! - [`live_stat`]: merges the four per-item lookups into a [`LiveStat`].
//!
//! [`LiveStat`]: crate::models::LiveStat

pub mod candle;
pub mod live_stat;

pub use candle::{CandleBook, CandleKey, aggregate_candles};
pub use live_stat::{LiveStatInputs, build_live_stat};
