//! Embedded schema migrations.

use anyhow::{Context, anyhow};
use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

/// Migrations bundled with this crate.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Apply pending migrations over a blocking connection.
pub fn run_postgres(url: &str) -> anyhow::Result<Vec<String>> {
    let mut conn = PgConnection::establish(url).context("connecting for migrations")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?;
    Ok(applied.iter().map(ToString::to_string).collect())
}

/// [`run_postgres`] on the blocking thread pool.
pub async fn run_pending(url: &str) -> anyhow::Result<()> {
    let url = url.to_owned();
    let applied = tokio::task::spawn_blocking(move || run_postgres(&url))
        .await
        .context("migration task")??;
    if applied.is_empty() {
        info!("schema up to date");
    }
    for version in applied {
        info!(%version, "applied migration");
    }
    Ok(())
}
