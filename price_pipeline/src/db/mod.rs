//! Postgres storage: pool construction, embedded migrations, and [`PgStore`],
//! the implementation of the pipeline's storage traits.
//!
//! Every trait method checks out its own pooled connection and returns it on
//! drop, so concurrent page fetches and batch writes never share a handle.
//!
//! Note: the migration runner uses diesel's synchronous `PgConnection`, which
//! needs the system libpq (e.g., libpq-dev on Debian/Ubuntu).

pub mod migrate;
pub mod pool;
mod rows;
pub mod store;

pub use pool::{PgPool, build_pool};
pub use store::PgStore;
