//! [`PgStore`]: diesel-async implementation of the storage traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    dsl::{max, min},
    prelude::*,
    upsert::excluded,
};
use diesel_async::{
    AsyncPgConnection, RunQueryDsl,
    pooled_connection::deadpool::Object,
};

use super::{
    pool::PgPool,
    rows::{CandleRow, HistoryRow, LiveStatRow},
};
use crate::{
    error::StoreError,
    models::{Candle, LiveStat, PriceObservation, PriceRange},
    schema::{item_price_candle, item_price_history, live_stats},
    source::{ObservationSource, PageRequest},
    tz::DayWindow,
    writer::{MergeMode, UpsertSink},
};

/// Storage backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>, StoreError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl ObservationSource for PgStore {
    async fn count_since(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        use item_price_history::dsl as h;
        let mut conn = self.conn().await?;
        let n: i64 = h::item_price_history
            .filter(h::timestamp.ge(cutoff))
            .count()
            .get_result(&mut *conn)
            .await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn fetch_page(
        &self,
        cutoff: DateTime<Utc>,
        page: PageRequest,
    ) -> Result<Vec<PriceObservation>, StoreError> {
        use item_price_history::dsl as h;
        let mut conn = self.conn().await?;
        let rows: Vec<(i32, i64, DateTime<Utc>)> = h::item_price_history
            .filter(h::timestamp.ge(cutoff))
            .order((h::item_id.asc(), h::timestamp.desc()))
            .limit(i64::from(page.limit))
            .offset(i64::try_from(page.offset).unwrap_or(i64::MAX))
            .select((h::item_id, h::price, h::timestamp))
            .load(&mut *conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(item_id, price, observed_at)| PriceObservation {
                item_id,
                price,
                observed_at,
            })
            .collect())
    }

    async fn latest_price(&self, item_id: i32, day: DayWindow) -> Result<Option<i64>, StoreError> {
        use item_price_history::dsl as h;
        let mut conn = self.conn().await?;
        Ok(h::item_price_history
            .filter(h::item_id.eq(item_id))
            .filter(h::timestamp.lt(day.end))
            .order(h::timestamp.desc())
            .select(h::price)
            .first::<i64>(&mut *conn)
            .await
            .optional()?)
    }

    async fn opening_price(
        &self,
        item_id: i32,
        day: DayWindow,
    ) -> Result<Option<i64>, StoreError> {
        use item_price_history::dsl as h;
        let mut conn = self.conn().await?;
        Ok(h::item_price_history
            .filter(h::item_id.eq(item_id))
            .filter(h::timestamp.ge(day.start))
            .filter(h::timestamp.lt(day.end))
            .order(h::timestamp.asc())
            .select(h::price)
            .first::<i64>(&mut *conn)
            .await
            .optional()?)
    }

    async fn price_range(
        &self,
        item_id: i32,
        day: DayWindow,
    ) -> Result<Option<PriceRange>, StoreError> {
        use item_price_history::dsl as h;
        let mut conn = self.conn().await?;
        let (low, high): (Option<i64>, Option<i64>) = h::item_price_history
            .filter(h::item_id.eq(item_id))
            .filter(h::timestamp.ge(day.start))
            .filter(h::timestamp.lt(day.end))
            .select((min(h::price), max(h::price)))
            .get_result(&mut *conn)
            .await?;
        Ok(low.zip(high).map(|(low, high)| PriceRange { low, high }))
    }
}

#[async_trait]
impl UpsertSink<PriceObservation> for PgStore {
    async fn upsert_batch(
        &self,
        rows: &[PriceObservation],
        mode: MergeMode,
    ) -> Result<usize, StoreError> {
        use item_price_history::dsl as h;
        if rows.is_empty() {
            return Ok(0);
        }
        let values: Vec<HistoryRow> = rows.iter().map(HistoryRow::from).collect();
        let mut conn = self.conn().await?;
        let insert = diesel::insert_into(h::item_price_history)
            .values(&values)
            .on_conflict((h::item_id, h::timestamp));
        let affected = match mode {
            MergeMode::Overwrite => {
                insert
                    .do_update()
                    .set(h::price.eq(excluded(h::price)))
                    .execute(&mut *conn)
                    .await?
            }
            MergeMode::Ignore => insert.do_nothing().execute(&mut *conn).await?,
        };
        Ok(affected)
    }
}

#[async_trait]
impl UpsertSink<Candle> for PgStore {
    async fn upsert_batch(&self, rows: &[Candle], mode: MergeMode) -> Result<usize, StoreError> {
        use item_price_candle::dsl as c;
        if rows.is_empty() {
            return Ok(0);
        }
        let values: Vec<CandleRow> = rows.iter().map(CandleRow::from).collect();
        let mut conn = self.conn().await?;
        let insert = diesel::insert_into(c::item_price_candle)
            .values(&values)
            .on_conflict((c::item_id, c::timestamp, c::interval));
        let affected = match mode {
            MergeMode::Overwrite => {
                insert
                    .do_update()
                    .set((
                        c::open.eq(excluded(c::open)),
                        c::high.eq(excluded(c::high)),
                        c::low.eq(excluded(c::low)),
                        c::close.eq(excluded(c::close)),
                    ))
                    .execute(&mut *conn)
                    .await?
            }
            MergeMode::Ignore => insert.do_nothing().execute(&mut *conn).await?,
        };
        Ok(affected)
    }
}

#[async_trait]
impl UpsertSink<LiveStat> for PgStore {
    async fn upsert_batch(&self, rows: &[LiveStat], mode: MergeMode) -> Result<usize, StoreError> {
        use live_stats::dsl as s;
        if rows.is_empty() {
            return Ok(0);
        }
        let values: Vec<LiveStatRow> = rows.iter().map(LiveStatRow::from).collect();
        let mut conn = self.conn().await?;
        let insert = diesel::insert_into(s::live_stats)
            .values(&values)
            .on_conflict(s::item_id);
        let affected = match mode {
            MergeMode::Overwrite => {
                insert
                    .do_update()
                    .set((
                        s::last_known_price.eq(excluded(s::last_known_price)),
                        s::opening_price.eq(excluded(s::opening_price)),
                        s::highest_price_today.eq(excluded(s::highest_price_today)),
                        s::lowest_price_today.eq(excluded(s::lowest_price_today)),
                        s::supply.eq(excluded(s::supply)),
                    ))
                    .execute(&mut *conn)
                    .await?
            }
            MergeMode::Ignore => insert.do_nothing().execute(&mut *conn).await?,
        };
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::build_pool, interval::Interval};
    use chrono::TimeZone;

    fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        crate::db::migrate::run_postgres(&url).expect("migrate");
        PgStore::new(build_pool(&url, 4).expect("pool"))
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
    async fn candle_overwrite_then_ignore() {
        let store = store();
        let t = Utc.with_ymd_and_hms(2001, 1, 1, 12, 0, 0).unwrap();
        let candle = Candle {
            item_id: 9_001,
            interval: Interval::Hour,
            bucket_start: t,
            open: 1,
            high: 5,
            low: 1,
            close: 3,
            open_time: t,
            close_time: t,
        };
        UpsertSink::<Candle>::upsert_batch(&store, &[candle], MergeMode::Overwrite)
            .await
            .unwrap();

        let wider = Candle { high: 50, ..candle };
        let ignored = UpsertSink::<Candle>::upsert_batch(&store, &[wider], MergeMode::Ignore)
            .await
            .unwrap();
        assert_eq!(ignored, 0);

        let replaced = UpsertSink::<Candle>::upsert_batch(&store, &[wider], MergeMode::Overwrite)
            .await
            .unwrap();
        assert_eq!(replaced, 1);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a scratch postgres"]
    async fn lookups_on_unknown_item_are_empty() {
        let store = store();
        let day = DayWindow::containing(Utc::now(), chrono_tz::UTC);
        assert_eq!(store.latest_price(-77, day).await.unwrap(), None);
        assert_eq!(store.opening_price(-77, day).await.unwrap(), None);
        assert_eq!(store.price_range(-77, day).await.unwrap(), None);
    }
}
