//! Provider abstraction for market data sources.
//!
//! This module defines the [`MarketDataProvider`] trait, the interface the
//! pipeline uses to pull market listings and the catalog-wide price preview.
//! [`bconomy_rest::BconomyProvider`] talks to the real API; tests substitute
//! in-memory fakes.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_feed::models::{MarketListing, MarketPreview};
//! use market_feed::providers::{MarketDataProvider, ProviderError};
//!
//! struct EmptyMarket;
//!
//! #[async_trait]
//! impl MarketDataProvider for EmptyMarket {
//!     async fn market_listings(&self, _item_id: i32) -> Result<Vec<MarketListing>, ProviderError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn market_preview(&self) -> Result<MarketPreview, ProviderError> {
//!         Ok(MarketPreview { last_updated: 0, data: Default::default() })
//!     }
//! }
//! ```

pub mod bconomy_rest;

use async_trait::async_trait;
use shared_utils::{config::ConfigError, env::MissingEnvVarError};
use snafu::{Backtrace, Snafu};

use crate::models::{MarketListing, MarketPreview};

/// Read access to the external market.
///
/// Implementations must be shareable across tasks; the live-stat refresh calls
/// `market_listings` for many items concurrently.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches all open listings for one item.
    async fn market_listings(&self, item_id: i32) -> Result<Vec<MarketListing>, ProviderError>;

    /// Fetches the current price of every catalog item.
    async fn market_preview(&self) -> Result<MarketPreview, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// an optional setting is present but malformed.
    #[snafu(display("Invalid provider setting: {source}"))]
    Setting {
        source: ConfigError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `MarketDataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The API answered with a non-success status.
    #[snafu(display("API returned status {status}: {body}"))]
    Api {
        status: u16,
        body: String,
        backtrace: Backtrace,
    },

    /// The response body did not match the expected shape.
    ///
    /// `body` is the raw response text, kept for diagnosis.
    #[snafu(display("Failed to decode API response ({source}); body: {body}"))]
    Decode {
        body: String,
        source: serde_json::Error,
        backtrace: Backtrace,
    },
}

impl ProviderError {
    /// Raw response body, when the failure happened after a response arrived.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ProviderError::Api { body, .. } | ProviderError::Decode { body, .. } => Some(body),
            ProviderError::Reqwest { .. } => None,
        }
    }
}
