//! Authenticated access to the market-data REST API.
//!
//! [`NetworkClient::fetch`] is the single entry point to the transport. It
//! checks connectivity, attaches the API key, classifies non-200 responses
//! and retries transient failures. The endpoint helpers build URLs on top of
//! it; the typed variants decode the returned bytes as well.

use std::sync::Arc;

use reqwest::Url;
use time::OffsetDateTime;

use crate::config::{ClientConfig, ACCEPT_ENCODING, API_KEY_HEADER, QUOTE_CURRENCY};
use crate::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::decoder::ApiRecord;
use crate::domain::{format_rfc3339, Asset, AssetIcon, ExchangeRate, ServerErrorEnvelope, TimeSeriesData};
use crate::error::{NetworkError, ServerErrorKind};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::retry::RetryConfig;

/// Aggregation period requested for exchange-rate history.
const HISTORY_PERIOD: &str = "1DAY";

/// Client for the asset, icon and exchange-rate endpoints.
#[derive(Clone)]
pub struct NetworkClient {
    http: Arc<dyn HttpClient>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    config: ClientConfig,
    retry: RetryConfig,
}

impl NetworkClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        config: ClientConfig,
    ) -> Self {
        Self {
            http,
            connectivity,
            config,
            retry: RetryConfig::default(),
        }
    }

    /// Client over the reqwest transport.
    pub fn with_reqwest(connectivity: Arc<dyn ConnectivityMonitor>, config: ClientConfig) -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new()), connectivity, config)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// GET `url` and return the body of a 200 response verbatim.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::Offline`] when connectivity is not satisfied; the
    ///   transport is not invoked.
    /// - [`NetworkError::Server`] for transport failures and non-200 statuses.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.retry.run(|| self.fetch_once(url)).await
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.ensure_connected().await?;

        let request = HttpRequest::get(url)
            .with_header(API_KEY_HEADER, self.config.api_key.as_str())
            .with_header("Accept-Encoding", ACCEPT_ENCODING)
            .with_timeout_ms(self.config.timeout_ms);

        tracing::debug!(url, "dispatching request");
        let response = self.http.execute(request).await.map_err(|error| {
            tracing::debug!(url, %error, retryable = error.retryable(), "transport failure");
            NetworkError::transport(error.message(), error.retryable())
        })?;

        if response.is_ok() {
            return Ok(response.body);
        }

        let kind = ServerErrorKind::from_status(response.status);
        let message = server_message(&response);
        tracing::debug!(url, status = response.status, ?kind, %message, "request rejected");
        Err(NetworkError::server(kind, message))
    }

    async fn ensure_connected(&self) -> Result<(), NetworkError> {
        let mut status = self.connectivity.status();
        if status == ConnectivityStatus::Unknown {
            tokio::time::sleep(self.config.connectivity_grace_period).await;
            status = self.connectivity.status();
        }

        if status == ConnectivityStatus::Satisfied {
            Ok(())
        } else {
            tracing::debug!(?status, "connectivity precondition failed");
            Err(NetworkError::Offline)
        }
    }

    // ========================================================================
    // URL builders
    // ========================================================================

    pub fn assets_url(&self) -> Result<String, NetworkError> {
        self.endpoint(&["assets"], &[])
    }

    pub fn asset_url(&self, asset_id: &str) -> Result<String, NetworkError> {
        let asset_id = require_identifier("asset id", asset_id)?;
        self.endpoint(&["assets", asset_id], &[])
    }

    pub fn asset_icons_url(&self, size: u32) -> Result<String, NetworkError> {
        if size == 0 {
            return Err(NetworkError::invalid_request("icon size must be positive"));
        }
        self.endpoint(&["assets", "icons", &size.to_string()], &[])
    }

    pub fn exchange_rate_url(&self, base: &str, quote: &str) -> Result<String, NetworkError> {
        let base = require_identifier("base asset", base)?;
        let quote = require_identifier("quote asset", quote)?;
        self.endpoint(&["exchangerate", base, quote], &[])
    }

    /// Daily history of `base` quoted in the fixed quote currency.
    pub fn time_series_url(
        &self,
        base: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<String, NetworkError> {
        let base = require_identifier("base asset", base)?;
        if from > to {
            return Err(NetworkError::invalid_request(
                "time series start is after its end",
            ));
        }

        self.endpoint(
            &["exchangerate", base, QUOTE_CURRENCY, "history"],
            &[
                ("period_id", String::from(HISTORY_PERIOD)),
                ("time_start", format_rfc3339(from)),
                ("time_end", format_rfc3339(to)),
            ],
        )
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String, NetworkError> {
        let mut url = self.config.base_url.trim_end_matches('/').to_owned();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }

        for (index, (name, value)) in query.iter().enumerate() {
            url.push(if index == 0 { '?' } else { '&' });
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }

        match Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
            _ => Err(NetworkError::invalid_request(format!(
                "cannot build request url from base '{}'",
                self.config.base_url
            ))),
        }
    }

    // ========================================================================
    // Raw endpoint helpers
    // ========================================================================

    pub async fn fetch_assets_data(&self) -> Result<Vec<u8>, NetworkError> {
        self.fetch(&self.assets_url()?).await
    }

    pub async fn fetch_asset_data(&self, asset_id: &str) -> Result<Vec<u8>, NetworkError> {
        self.fetch(&self.asset_url(asset_id)?).await
    }

    pub async fn fetch_asset_icons_data(&self, size: u32) -> Result<Vec<u8>, NetworkError> {
        self.fetch(&self.asset_icons_url(size)?).await
    }

    pub async fn fetch_exchange_rate_data(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<Vec<u8>, NetworkError> {
        self.fetch(&self.exchange_rate_url(base, quote)?).await
    }

    pub async fn fetch_time_series_data(
        &self,
        base: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<u8>, NetworkError> {
        self.fetch(&self.time_series_url(base, from, to)?).await
    }

    // ========================================================================
    // Typed endpoint helpers
    // ========================================================================

    pub async fn fetch_assets(&self) -> Result<Vec<Asset>, NetworkError> {
        Asset::decode_array(&self.fetch_assets_data().await?)
    }

    /// The single-asset endpoint serves a one-element array.
    pub async fn fetch_asset(&self, asset_id: &str) -> Result<Vec<Asset>, NetworkError> {
        Asset::decode_array(&self.fetch_asset_data(asset_id).await?)
    }

    pub async fn fetch_asset_icons(&self, size: u32) -> Result<Vec<AssetIcon>, NetworkError> {
        AssetIcon::decode_array(&self.fetch_asset_icons_data(size).await?)
    }

    pub async fn fetch_exchange_rate(
        &self,
        base: &str,
        quote: &str,
    ) -> Result<ExchangeRate, NetworkError> {
        ExchangeRate::decode(&self.fetch_exchange_rate_data(base, quote).await?)
    }

    pub async fn fetch_time_series(
        &self,
        base: &str,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<TimeSeriesData>, NetworkError> {
        TimeSeriesData::decode_array(&self.fetch_time_series_data(base, from, to).await?)
    }
}

impl std::fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("base_url", &self.config.base_url)
            .field("timeout_ms", &self.config.timeout_ms)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn require_identifier<'a>(what: &str, value: &'a str) -> Result<&'a str, NetworkError> {
    if value.trim().is_empty() {
        Err(NetworkError::invalid_request(format!("{what} must not be empty")))
    } else {
        Ok(value)
    }
}

/// Human-readable message for a rejected request.
fn server_message(response: &HttpResponse) -> String {
    if response.body.is_empty() {
        return format!("HTTP {}", response.status);
    }

    if let Ok(envelope) = ServerErrorEnvelope::decode(&response.body) {
        return envelope.error;
    }

    match std::str::from_utf8(&response.body) {
        Ok(text) => text.to_owned(),
        Err(_) => format!("<{} bytes of binary data>", response.body.len()),
    }
}
