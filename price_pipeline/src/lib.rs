//! Extract-aggregate-load pipeline for item price data.
//!
//! One invocation pulls raw [`models::PriceObservation`]s (paged, in parallel)
//! or per-item live inputs, reduces them into hourly/daily
//! [`models::Candle`]s or [`models::LiveStat`] snapshots, and writes the result
//! back with batched, idempotent upserts.
//!
//! Stages:
//! - [`source`]: read-side storage contract and the lookups built on it.
//! - [`aggregate`]: order-independent candle bucketing and live-stat merging.
//! - [`coordinator`]: bounded fan-out/fan-in with fail-fast collection.
//! - [`writer`]: fixed-size batches written concurrently, best effort.
//! - [`jobs`]: the three runs (`scrape`, `candles`, `live-stats`) wired end to end.
//! - [`db`]: the Postgres implementation of the storage traits.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod interval;
pub mod invocation;
pub mod jobs;
pub mod models;
pub mod schema;
pub mod source;
pub mod tz;
pub mod writer;
