use std::{num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use shared_utils::env::{get_env_var, get_env_var_opt, parse_env_var};
use snafu::ResultExt;

use crate::{
    models::{MarketListing, MarketPreview},
    providers::{
        ClientBuildSnafu, InvalidApiKeySnafu, MarketDataProvider, MissingEnvVarSnafu,
        ProviderError, ProviderInitError, ReqwestSnafu, SettingSnafu,
        bconomy_rest::{request::DataRequest, response::decode_response},
    },
};

pub const DEFAULT_ENDPOINT: &str = "https://bconomy.net/api/data";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to build a [`BconomyProvider`] without touching the
/// environment.
pub struct BconomySettings {
    pub api_key: SecretString,
    pub endpoint: String,
    /// Client-side cap on requests per second; `None` disables throttling.
    pub max_requests_per_second: Option<NonZeroU32>,
    pub timeout: Duration,
}

impl BconomySettings {
    /// Settings with the production endpoint and no throttling.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_requests_per_second: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct BconomyProvider {
    client: Client,
    endpoint: String,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    _api_key: SecretString,
}

impl BconomyProvider {
    /// Creates a new provider from the environment.
    ///
    /// Reads the API key from `BCONOMY_API_KEY`, and optionally the endpoint
    /// from `BCONOMY_API_URL` and a request quota from `BCONOMY_MAX_RPS`.
    pub fn new() -> Result<Self, ProviderInitError> {
        let api_key = get_env_var("BCONOMY_API_KEY").context(MissingEnvVarSnafu)?;
        let api_key = SecretString::new(api_key.into());
        let mut settings = BconomySettings::new(api_key);
        if let Some(url) = get_env_var_opt("BCONOMY_API_URL") {
            settings.endpoint = url;
        }
        settings.max_requests_per_second =
            parse_env_var::<NonZeroU32>("BCONOMY_MAX_RPS").context(SettingSnafu)?;
        Self::with_settings(settings)
    }

    pub fn with_settings(settings: BconomySettings) -> Result<Self, ProviderInitError> {
        let mut key_value = header::HeaderValue::from_str(settings.api_key.expose_secret())
            .context(InvalidApiKeySnafu)?;
        key_value.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert("x-api-key", key_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .context(ClientBuildSnafu)?;

        let limiter = settings
            .max_requests_per_second
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            client,
            endpoint: settings.endpoint,
            limiter,
            _api_key: settings.api_key,
        })
    }

    async fn post<T: DeserializeOwned>(&self, request: &DataRequest) -> Result<T, ProviderError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;
        decode_response(status, body)
    }
}

#[async_trait]
impl MarketDataProvider for BconomyProvider {
    async fn market_listings(&self, item_id: i32) -> Result<Vec<MarketListing>, ProviderError> {
        tracing::debug!(item_id, "fetching market listings");
        let result = self.post(&DataRequest::MarketListings { item_id }).await;
        if let Err(e) = &result {
            tracing::warn!(item_id, error = %e, "market listings request failed");
        }
        result
    }

    async fn market_preview(&self) -> Result<MarketPreview, ProviderError> {
        tracing::debug!("fetching market preview");
        self.post(&DataRequest::MarketPreview).await
    }
}
