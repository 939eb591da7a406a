use std::{io::Read, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use market_feed::providers::bconomy_rest::BconomyProvider;
use price_pipeline::{
    config::PipelineConfig,
    db::{PgStore, build_pool, migrate},
    interval::Interval,
    invocation::{LiveStatPayload, item_range},
    jobs::{CandleJob, LiveStatJob, run_candle_job, run_live_stat_job, run_scrape_job},
    tz::{DayWindow, parse_ts_to_utc},
    writer::MergeMode,
};
use shared_utils::env::get_env_var;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Item price pipeline: scrape, candles, live stats")]
struct Cli {
    /// TOML file with pipeline settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations
    Migrate,
    /// Record the current market preview into price history
    Scrape,
    /// Aggregate today's price history into candles
    Candles(CandlesArgs),
    /// Refresh live stats for one batch of items
    LiveStats(LiveStatsArgs),
}

#[derive(Args)]
struct CandlesArgs {
    #[arg(long, default_value = "1h")]
    interval: Interval,
    #[arg(long, default_value = "overwrite")]
    mode: MergeMode,
    /// reference instant (RFC 3339) whose day is aggregated
    #[arg(long, value_name = "TS", value_parser = parse_as_of)]
    as_of: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct LiveStatsArgs {
    /// raw invocation payload, e.g. {"batchNumber":"0"}
    #[arg(long, conflicts_with = "batch")]
    payload: Option<String>,
    /// batch number, bypassing the payload
    #[arg(long)]
    batch: Option<u32>,
    /// reference instant (RFC 3339) whose day counts as "today"
    #[arg(long, value_name = "TS", value_parser = parse_as_of)]
    as_of: Option<DateTime<Utc>>,
}

fn parse_as_of(s: &str) -> Result<DateTime<Utc>, String> {
    parse_ts_to_utc(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = PipelineConfig::load(cli.config.as_deref())?;

    let outcome = run(cli.cmd, &cfg).await;
    if let Err(err) = &outcome {
        error!("run failed: {err:#}");
    }
    outcome
}

async fn run(cmd: Cmd, cfg: &PipelineConfig) -> Result<()> {
    let database_url = get_env_var("DATABASE_URL")?;

    if let Cmd::Migrate = cmd {
        return migrate::run_pending(&database_url).await;
    }

    let store = Arc::new(PgStore::new(build_pool(&database_url, cfg.pool_max_size)?));

    match cmd {
        Cmd::Migrate => Ok(()),
        Cmd::Scrape => {
            let provider = BconomyProvider::new()?;
            let report =
                run_scrape_job(&provider, store, cfg.catalog_size, cfg.batch_writer()).await?;
            report.write.ensure_complete()?;
            Ok(())
        }
        Cmd::Candles(args) => {
            let now = args.as_of.unwrap_or_else(Utc::now);
            let day = DayWindow::containing(now, cfg.day_tz()?);
            let job = CandleJob::from_config(cfg, args.interval, args.mode, day.start);
            let report = run_candle_job(Arc::clone(&store), store, job).await?;
            info!(
                observations = report.observations,
                pages = report.pages,
                candles = report.candles,
                written = report.write.written,
                "candles done"
            );
            report.write.ensure_complete()?;
            Ok(())
        }
        Cmd::LiveStats(args) => {
            let batch = match (args.batch, args.payload) {
                (Some(batch), _) => batch,
                (None, Some(raw)) => LiveStatPayload::from_json(&raw)?.batch()?,
                (None, None) => {
                    let mut raw = String::new();
                    std::io::stdin()
                        .read_to_string(&mut raw)
                        .context("reading payload from stdin")?;
                    if raw.trim().is_empty() {
                        bail!("live-stats needs --batch, --payload or a JSON payload on stdin");
                    }
                    LiveStatPayload::from_json(&raw)?.batch()?
                }
            };
            let items = item_range(batch, cfg.items_per_batch)?;
            let now = args.as_of.unwrap_or_else(Utc::now);
            let day = DayWindow::containing(now, cfg.day_tz()?);
            let provider = Arc::new(BconomyProvider::new()?);

            let job = LiveStatJob::from_config(cfg, items, day);
            let report = run_live_stat_job(Arc::clone(&store), provider, store, job).await;
            for failure in &report.failed {
                error!(item_id = failure.item_id, error = %failure.error, "item not refreshed");
            }
            report.ensure_complete()?;
            Ok(())
        }
    }
}
