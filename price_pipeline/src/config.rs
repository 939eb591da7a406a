//! Run configuration: defaults, optional TOML file, environment overrides.
//!
//! Precedence, lowest first:
//! 1. [`PipelineConfig::default`]
//! 2. a TOML file (`--config <FILE>`), unknown keys rejected
//! 3. `PIPELINE_*` environment variables
//!
//! [`PipelineConfig::load`] applies all three and then [`PipelineConfig::validate`]s.

use std::{path::Path, time::Duration};

use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared_utils::{config::ConfigError, env::parse_env_var};

use crate::{coordinator::ExtractionLimits, writer::BatchWriter};

/// Postgres caps bind parameters per statement; the widest row has 7 columns.
const MAX_WRITE_BATCH: usize = 65_535 / 7;

/// Tunables for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// rows per extraction page
    pub page_size: u32,
    /// extraction pages fetched concurrently
    pub page_workers: usize,
    /// global wait for all extraction pages, in seconds
    pub extract_timeout_secs: u64,
    /// items refreshed concurrently in a live-stat sweep
    pub item_concurrency: usize,
    /// items per live-stat invocation batch
    pub items_per_batch: u32,
    /// number of catalog items (`item0` .. `item{n-1}`) the scraper keeps
    pub catalog_size: u32,
    /// rows per upsert statement
    pub write_batch_size: usize,
    /// upsert statements in flight at once
    pub write_concurrency: usize,
    /// maximum pooled database connections
    pub pool_max_size: usize,
    /// IANA zone that defines "today"
    pub day_timezone: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            page_workers: 16,
            extract_timeout_secs: 30,
            item_concurrency: 50,
            items_per_batch: 83,
            catalog_size: 165,
            write_batch_size: 100,
            write_concurrency: 8,
            pool_max_size: 16,
            day_timezone: "UTC".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, then `path` if given, then the environment; validated.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_toml_path(path)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("parsing pipeline config")
    }

    /// Read and parse a TOML file.
    pub fn from_toml_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Overlay `PIPELINE_*` environment variables that are set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = parse_env_var("PIPELINE_PAGE_SIZE")? {
            self.page_size = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_PAGE_WORKERS")? {
            self.page_workers = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_EXTRACT_TIMEOUT_SECS")? {
            self.extract_timeout_secs = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_ITEM_CONCURRENCY")? {
            self.item_concurrency = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_ITEMS_PER_BATCH")? {
            self.items_per_batch = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_CATALOG_SIZE")? {
            self.catalog_size = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_WRITE_BATCH_SIZE")? {
            self.write_batch_size = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_WRITE_CONCURRENCY")? {
            self.write_concurrency = v;
        }
        if let Some(v) = parse_env_var("PIPELINE_POOL_MAX_SIZE")? {
            self.pool_max_size = v;
        }
        if let Some(v) = parse_env_var::<String>("PIPELINE_DAY_TZ")? {
            self.day_timezone = v;
        }
        Ok(())
    }

    /// Reject values that would stall or misconfigure a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("page_size", self.page_size as u64),
            ("page_workers", self.page_workers as u64),
            ("extract_timeout_secs", self.extract_timeout_secs),
            ("item_concurrency", self.item_concurrency as u64),
            ("items_per_batch", self.items_per_batch as u64),
            ("write_batch_size", self.write_batch_size as u64),
            ("write_concurrency", self.write_concurrency as u64),
            ("pool_max_size", self.pool_max_size as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        if self.write_batch_size > MAX_WRITE_BATCH {
            return Err(ConfigError::Invalid(format!(
                "write_batch_size {} exceeds {MAX_WRITE_BATCH}",
                self.write_batch_size
            )));
        }
        self.day_tz()?;
        Ok(())
    }

    /// The zone that defines "today".
    pub fn day_tz(&self) -> Result<Tz, ConfigError> {
        self.day_timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid(format!("day_timezone {:?}: {e}", self.day_timezone)))
    }

    /// Extraction knobs derived from this config.
    pub fn extraction_limits(&self) -> ExtractionLimits {
        ExtractionLimits {
            page_size: self.page_size,
            page_workers: self.page_workers,
            wait_timeout: Duration::from_secs(self.extract_timeout_secs),
        }
    }

    /// Writer derived from this config.
    pub fn batch_writer(&self) -> BatchWriter {
        BatchWriter::new(self.write_batch_size, self.write_concurrency)
    }
}
