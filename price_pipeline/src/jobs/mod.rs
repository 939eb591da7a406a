//! End-to-end runs. Each job wires extraction, aggregation and writing
//! together and returns a report; the caller decides the exit status.
//!
//! - [`scrape`]: market preview -> price history.
//! - [`candles`]: today's history -> hourly/daily candles.
//! - [`live_stats`]: per-item lookups -> live-stat snapshots.

pub mod candles;
pub mod live_stats;
pub mod scrape;

pub use candles::{CandleJob, CandleRunReport, run_candle_job};
pub use live_stats::{LiveStatJob, LiveStatRunReport, run_live_stat_job};
pub use scrape::{ScrapeReport, run_scrape_job};
