//! Async connection pool.

use anyhow::Context;
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};

/// Pool of async Postgres connections.
pub type PgPool = Pool<AsyncPgConnection>;

/// Build a pool for `database_url` holding at most `max_size` connections.
///
/// Connections are opened lazily on first checkout.
pub fn build_pool(database_url: &str, max_size: usize) -> anyhow::Result<PgPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder(manager)
        .max_size(max_size)
        .build()
        .context("building postgres connection pool")
}
