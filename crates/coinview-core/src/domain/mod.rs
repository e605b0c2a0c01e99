//! # Domain Models
//!
//! Record shapes served by the market-data API.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Asset`] | Asset metadata plus user-owned favorite flag and cache timestamp |
//! | [`AssetIcon`] | Icon URL for an asset at one pixel size |
//! | [`IconIndex`] | Asset id to icon URL lookup |
//! | [`ExchangeRate`] | Spot rate between a base and quote asset |
//! | [`TimeSeriesData`] | One OHLC bar of an exchange-rate history |
//! | [`ServerErrorEnvelope`] | `{"error": "..."}` body of failed responses |
//!
//! Timestamps in payloads use seven fractional digits and a zone designator;
//! see [`timestamp`].

mod models;
pub mod timestamp;

pub use models::{
    rate_range, Asset, AssetIcon, ExchangeRate, IconIndex, ServerErrorEnvelope, TimeSeriesData,
};
pub use timestamp::{format_rfc3339, parse_api_timestamp, parse_rfc3339, TimestampError};
