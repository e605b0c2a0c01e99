use std::collections::HashMap;

use serde::Deserialize;
use time::OffsetDateTime;

use super::timestamp::api_timestamp;

/// A tradable instrument with metadata and optional market statistics.
///
/// `is_favorite` and `last_fetched` are owned by the user and the cache layer;
/// they are never read from API payloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub type_is_crypto: i32,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub data_quote_start: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub data_quote_end: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub data_orderbook_start: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub data_orderbook_end: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub data_trade_start: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub data_trade_end: Option<OffsetDateTime>,
    #[serde(default)]
    pub data_symbols_count: Option<i64>,
    #[serde(default)]
    pub volume_1hrs_usd: Option<f64>,
    #[serde(default)]
    pub volume_1day_usd: Option<f64>,
    #[serde(default)]
    pub volume_1mth_usd: Option<f64>,
    /// Binary floating point; do not compare for exact equality.
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(skip)]
    pub is_favorite: bool,
    #[serde(skip)]
    pub last_fetched: Option<OffsetDateTime>,
}

impl Asset {
    /// An asset with only its identifier set.
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            name: None,
            type_is_crypto: 0,
            data_quote_start: None,
            data_quote_end: None,
            data_orderbook_start: None,
            data_orderbook_end: None,
            data_trade_start: None,
            data_trade_end: None,
            data_symbols_count: None,
            volume_1hrs_usd: None,
            volume_1day_usd: None,
            volume_1mth_usd: None,
            price_usd: None,
            is_favorite: false,
            last_fetched: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub const fn is_crypto(&self) -> bool {
        self.type_is_crypto != 0
    }

    /// The name, or the identifier when the API left the name out.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.asset_id)
    }

    /// Case-insensitive match of `query` against name or identifier.
    /// An empty query matches everything.
    pub fn matches_search(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }

        let needle = query.to_lowercase();
        self.asset_id.to_lowercase().contains(&needle)
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
    }
}

/// Icon location for an asset at one pixel size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetIcon {
    #[serde(default)]
    pub exchange_id: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Lookup from asset identifier to icon URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconIndex {
    urls: HashMap<String, String>,
}

impl IconIndex {
    /// Icons lacking an asset id or URL are unusable for display and skipped.
    pub fn from_icons(icons: impl IntoIterator<Item = AssetIcon>) -> Self {
        let urls = icons
            .into_iter()
            .filter_map(|icon| match (icon.asset_id, icon.url) {
                (Some(asset_id), Some(url)) if !url.is_empty() => Some((asset_id, url)),
                _ => None,
            })
            .collect();
        Self { urls }
    }

    pub fn url_for(&self, asset_id: &str) -> Option<&str> {
        self.urls.get(asset_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Spot exchange rate between two assets.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeRate {
    #[serde(deserialize_with = "api_timestamp::deserialize")]
    pub time: OffsetDateTime,
    #[serde(default)]
    pub asset_id_base: Option<String>,
    #[serde(default)]
    pub asset_id_quote: Option<String>,
    pub rate: f64,
}

/// One OHLC bar of an exchange-rate history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeSeriesData {
    #[serde(deserialize_with = "api_timestamp::deserialize")]
    pub time_period_start: OffsetDateTime,
    #[serde(deserialize_with = "api_timestamp::deserialize")]
    pub time_period_end: OffsetDateTime,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub time_open: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "api_timestamp::option::deserialize")]
    pub time_close: Option<OffsetDateTime>,
    #[serde(default)]
    pub rate_open: Option<f64>,
    #[serde(default)]
    pub rate_high: Option<f64>,
    #[serde(default)]
    pub rate_low: Option<f64>,
    #[serde(default)]
    pub rate_close: Option<f64>,
}

/// Lowest `rate_low` and highest `rate_high` across a series.
pub fn rate_range(series: &[TimeSeriesData]) -> Option<(f64, f64)> {
    let low = series
        .iter()
        .filter_map(|bar| bar.rate_low)
        .fold(None, |acc: Option<f64>, value| Some(acc.map_or(value, |a| a.min(value))))?;
    let high = series
        .iter()
        .filter_map(|bar| bar.rate_high)
        .fold(None, |acc: Option<f64>, value| Some(acc.map_or(value, |a| a.max(value))))?;
    Some((low, high))
}

/// Error body served with non-200 responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerErrorEnvelope {
    pub error: String,
}
