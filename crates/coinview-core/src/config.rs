//! Client configuration loaded from environment variables.
//!
//! - `COINVIEW_API_KEY`: static API key sent with every request (required)
//! - `COINVIEW_BASE_URL`: API root, defaults to the public CoinAPI REST endpoint
//! - `COINVIEW_TIMEOUT_MS`: per-request timeout in milliseconds

use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://rest.coinapi.io/v1";
pub const API_KEY_HEADER: &str = "X-CoinAPI-Key";
pub const ACCEPT_ENCODING: &str = "deflate, gzip";
/// The only quote currency used for exchange-rate history.
pub const QUOTE_CURRENCY: &str = "EUR";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Settings for [`NetworkClient`](crate::NetworkClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    /// API root without a trailing slash.
    pub base_url: String,
    pub timeout_ms: u64,
    /// Wait applied once when connectivity has not been reported yet.
    pub connectivity_grace_period: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            connectivity_grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Load configuration from `COINVIEW_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the API key is missing or another variable
    /// holds an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            non_empty_var("COINVIEW_API_KEY").ok_or(ConfigError::MissingVar("COINVIEW_API_KEY"))?;
        let mut config = Self::new(api_key);

        if let Some(base_url) = non_empty_var("COINVIEW_BASE_URL") {
            config = config.with_base_url(base_url)?;
        }

        if let Some(raw) = non_empty_var("COINVIEW_TIMEOUT_MS") {
            let timeout_ms = raw
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidVar {
                    name: "COINVIEW_TIMEOUT_MS",
                    value: raw,
                })?;
            config.timeout_ms = timeout_ms;
        }

        Ok(config)
    }

    /// Override the API root. Trailing slashes are dropped.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                self.base_url = trimmed.to_owned();
                Ok(self)
            }
            _ => Err(ConfigError::InvalidBaseUrl(base_url)),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.connectivity_grace_period = grace_period;
        self
    }
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
