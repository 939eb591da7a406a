mod common;

use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::Duration as Span;
use common::{MemoryStore, at, obs};
use price_pipeline::{
    coordinator::{ExtractionLimits, extract_observations},
    error::PipelineError,
    interval::Interval,
    jobs::{CandleJob, run_candle_job},
    models::PriceObservation,
    writer::{BatchWriter, MergeMode},
};
use proptest::prelude::*;

fn job(interval: Interval, mode: MergeMode, limits: ExtractionLimits) -> CandleJob {
    CandleJob {
        interval,
        mode,
        cutoff: at(0, 0),
        limits,
        writer: BatchWriter::new(100, 4),
    }
}

fn limits(page_size: u32, page_workers: usize) -> ExtractionLimits {
    ExtractionLimits {
        page_size,
        page_workers,
        wait_timeout: Duration::from_secs(30),
    }
}

/// `n` distinct observations over items 0..5, 37 seconds apart from midnight.
fn spread(n: usize) -> Vec<PriceObservation> {
    (0..n)
        .map(|i| {
            let item = (i % 5) as i32;
            let price = 100 + (i as i64 * 7919) % 500;
            obs(item, price, at(0, 0) + Span::seconds(i as i64 * 37))
        })
        .collect()
}

#[tokio::test]
async fn hourly_candle_from_three_observations() {
    let store = Arc::new(MemoryStore::with_history([
        obs(1, 10, at(12, 5)),
        obs(1, 15, at(12, 40)),
        obs(1, 8, at(12, 50)),
    ]));

    let report = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Hour, MergeMode::Overwrite, limits(1000, 4)),
    )
    .await
    .unwrap();

    assert_eq!((report.observations, report.candles, report.write.written), (3, 1, 1));
    let c = store.candle(1, at(12, 0), Interval::Hour).unwrap();
    assert_eq!((c.open, c.high, c.low, c.close), (10, 15, 8, 8));
}

#[tokio::test]
async fn observations_before_cutoff_are_not_aggregated() {
    let yesterday = at(23, 0) - Span::days(1);
    let store = Arc::new(MemoryStore::with_history([
        obs(1, 999, yesterday),
        obs(1, 10, at(1, 0)),
    ]));

    run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Day, MergeMode::Overwrite, limits(1000, 4)),
    )
    .await
    .unwrap();

    let candles = store.candles();
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].high, 10);
}

#[tokio::test]
async fn overwrite_runs_are_idempotent() {
    let store = Arc::new(MemoryStore::with_history(spread(700)));
    let j = job(Interval::Hour, MergeMode::Overwrite, limits(64, 3));

    run_candle_job(Arc::clone(&store), Arc::clone(&store), j).await.unwrap();
    let first = store.candles();
    run_candle_job(Arc::clone(&store), Arc::clone(&store), j).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(store.candles(), first);
}

#[tokio::test]
async fn ignore_mode_keeps_the_first_stored_candle() {
    let store = Arc::new(MemoryStore::with_history([
        obs(1, 10, at(12, 5)),
        obs(1, 12, at(12, 10)),
    ]));
    let ignore = job(Interval::Hour, MergeMode::Ignore, limits(1000, 2));
    run_candle_job(Arc::clone(&store), Arc::clone(&store), ignore).await.unwrap();

    // a later spike in the same bucket
    store.record([obs(1, 50, at(12, 30))]);
    let report = run_candle_job(Arc::clone(&store), Arc::clone(&store), ignore).await.unwrap();
    assert_eq!(report.write.affected, 0);
    assert_eq!(store.candle(1, at(12, 0), Interval::Hour).unwrap().high, 12);

    let overwrite = job(Interval::Hour, MergeMode::Overwrite, limits(1000, 2));
    run_candle_job(Arc::clone(&store), Arc::clone(&store), overwrite).await.unwrap();
    let c = store.candle(1, at(12, 0), Interval::Hour).unwrap();
    assert_eq!((c.high, c.close), (50, 50));
}

#[tokio::test]
async fn one_failed_page_writes_nothing() {
    let mut store = MemoryStore::with_history(spread(250));
    store.failing_pages.insert(2);
    let store = Arc::new(store);

    let err = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Hour, MergeMode::Overwrite, limits(50, 2)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Page { page: 2, offset: 100, .. }), "{err}");
    assert!(store.candles().is_empty());
}

/// Item 0 at 07:00 and 06:00, item 1 from 04:00 back to its 7 open at 01:00.
/// Pages of two with one worker: the row order is the page order.
fn two_item_day() -> MemoryStore {
    MemoryStore::with_history([
        obs(0, 21, at(7, 0)),
        obs(0, 20, at(6, 0)),
        obs(1, 9, at(4, 0)),
        obs(1, 8, at(3, 0)),
        obs(1, 8, at(2, 0)),
        obs(1, 7, at(1, 0)),
    ])
}

#[tokio::test]
async fn row_landing_behind_a_served_page_fails_the_run() {
    let store = two_item_day();
    // sorts after page 0: pages 1 and 2 shift by one and item 1's open is never read
    *store.late_row.lock().unwrap() = Some((0, obs(0, 1, at(5, 0))));
    let store = Arc::new(store);

    let err = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Day, MergeMode::Overwrite, limits(2, 1)),
    )
    .await
    .unwrap_err();

    match err {
        PipelineError::Drift {
            expected,
            read,
            recount,
        } => assert_eq!((expected, read, recount), (6, 6, 7)),
        other => panic!("expected drift, got {other}"),
    }
    assert!(store.candles().is_empty());
}

#[tokio::test]
async fn row_landing_ahead_of_a_served_page_is_not_double_counted() {
    let store = two_item_day();
    // sorts first: page 1 re-reads 06:00 and 01:00 falls off the end
    *store.late_row.lock().unwrap() = Some((0, obs(0, 30, at(8, 0))));
    let store = Arc::new(store);

    let err = extract_observations(Arc::clone(&store), at(0, 0), limits(2, 1))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Drift { expected: 6, read: 5, recount: 7 }),
        "{err}"
    );
}

#[tokio::test]
async fn quiet_history_reads_item_open_from_the_last_page() {
    let store = Arc::new(two_item_day());
    let report = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Day, MergeMode::Overwrite, limits(2, 1)),
    )
    .await
    .unwrap();

    assert_eq!(report.pages, 3);
    let c = store.candle(1, at(0, 0), Interval::Day).expect("item 1 candle");
    assert_eq!((c.open, c.high, c.low, c.close), (7, 9, 7, 9));
}

#[tokio::test]
async fn empty_day_is_a_successful_no_op() {
    let store = Arc::new(MemoryStore::default());
    let report = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Hour, MergeMode::Overwrite, limits(1000, 4)),
    )
    .await
    .unwrap();
    assert_eq!((report.pages, report.candles), (0, 0));
    assert!(report.write.is_complete());
}

#[tokio::test]
async fn page_workers_cap_concurrent_fetches() {
    let mut store = MemoryStore::with_history(spread(1000));
    store.page_delay = Some(Duration::from_millis(5));
    let store = Arc::new(store);

    let extraction = extract_observations(Arc::clone(&store), at(0, 0), limits(10, 3))
        .await
        .unwrap();

    assert_eq!(extraction.pages, 100);
    assert_eq!(store.page_calls.load(std::sync::atomic::Ordering::SeqCst), 100);
    assert!(store.pages.peak() <= 3, "peak {}", store.pages.peak());
}

#[tokio::test]
async fn failed_write_batch_spares_the_others() {
    let mut store = MemoryStore::with_history((0..30).map(|item| obs(item, 5, at(3, 0))));
    store.poisoned_item = Some(17);
    let store = Arc::new(store);

    let mut j = job(Interval::Hour, MergeMode::Overwrite, limits(1000, 2));
    j.writer = BatchWriter::new(10, 2);
    let report = run_candle_job(Arc::clone(&store), Arc::clone(&store), j).await.unwrap();

    assert_eq!(report.candles, 30);
    assert_eq!(report.write.written, 20);
    assert_eq!(report.write.failed.len(), 1);
    assert_eq!(report.write.failed[0].rows, 10..20);
    assert_eq!(store.candles().len(), 20);
    assert!(report.write.ensure_complete().is_err());
}

#[tokio::test(start_paused = true)]
async fn stalled_page_times_out_at_the_deadline() {
    let mut store = MemoryStore::with_history(spread(250));
    store.stalled_pages.insert(1);
    let store = Arc::new(store);

    let started = tokio::time::Instant::now();
    let err = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Hour, MergeMode::Overwrite, limits(100, 4)),
    )
    .await
    .unwrap_err();
    let waited = started.elapsed();

    match err {
        PipelineError::Timeout {
            completed, total, ..
        } => assert_eq!((completed, total), (2, 3)),
        other => panic!("expected timeout, got {other}"),
    }
    assert!(waited >= Duration::from_secs(30), "gave up early: {waited:?}");
    assert!(waited < Duration::from_secs(31), "gave up late: {waited:?}");
    assert!(store.candles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_page_does_not_wait_for_a_stalled_sibling() {
    let mut store = MemoryStore::with_history(spread(250));
    store.stalled_pages.insert(1);
    store.failing_pages.insert(0);
    store.page_delay = Some(Duration::from_millis(50));
    let store = Arc::new(store);

    let started = tokio::time::Instant::now();
    let err = run_candle_job(
        Arc::clone(&store),
        Arc::clone(&store),
        job(Interval::Hour, MergeMode::Overwrite, limits(100, 3)),
    )
    .await
    .unwrap_err();
    let waited = started.elapsed();

    assert!(matches!(err, PipelineError::Page { page: 0, .. }), "{err}");
    assert!(waited < Duration::from_secs(1), "waited for the stall: {waited:?}");
    assert!(store.candles().is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_pages_inside_the_deadline_succeed() {
    let mut store = MemoryStore::with_history(spread(300));
    store.page_delay = Some(Duration::from_secs(9));
    let store = Arc::new(store);

    // three pages, one at a time: 27s of a 30s budget
    let extraction = extract_observations(Arc::clone(&store), at(0, 0), limits(100, 1))
        .await
        .unwrap();
    assert_eq!(extraction.observations.len(), 300);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pages_union_to_the_full_set(n in 0usize..400, page_size in 1u32..120, workers in 1usize..6) {
        let rows = spread(n);
        let store = Arc::new(MemoryStore::with_history(rows.clone()));
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let extraction = rt
            .block_on(extract_observations(Arc::clone(&store), at(0, 0), limits(page_size, workers)))
            .unwrap();

        let got: HashSet<_> = extraction.observations.iter().copied().collect();
        let want: HashSet<_> = rows.into_iter().collect();
        prop_assert_eq!(extraction.observations.len(), want.len());
        prop_assert_eq!(got, want);
        prop_assert_eq!(extraction.pages, n.div_ceil(page_size as usize));
    }
}
