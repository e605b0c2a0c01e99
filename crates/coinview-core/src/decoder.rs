//! Strict JSON decoding of API payloads.
//!
//! Every failure (malformed JSON, missing or mistyped required fields, bad
//! timestamps, record validation) collapses into
//! [`NetworkError::DecodingFailed`]. The underlying cause is logged at debug
//! level only.

use serde::de::DeserializeOwned;

use crate::domain::{Asset, AssetIcon, ExchangeRate, ServerErrorEnvelope, TimeSeriesData};
use crate::error::NetworkError;

/// A record shape that can be decoded from API bytes.
pub trait ApiRecord: DeserializeOwned {
    /// Record name used in log events.
    const NAME: &'static str;

    /// Checks beyond structure; a failure rejects the whole payload.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Records without a usable key are dropped from arrays.
    fn is_keyless(&self) -> bool {
        false
    }

    /// Decode a single JSON object.
    fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        let value: Self = parse(bytes, Self::NAME)?;
        check(&value)?;
        Ok(value)
    }

    /// Decode a JSON array; an empty array yields an empty vector.
    ///
    /// Keyless records are skipped with a warning; any other invalid record
    /// rejects the payload.
    fn decode_array(bytes: &[u8]) -> Result<Vec<Self>, NetworkError> {
        let values: Vec<Self> = parse(bytes, Self::NAME)?;
        let total = values.len();
        let values: Vec<Self> = values.into_iter().filter(|value| !value.is_keyless()).collect();
        if values.len() < total {
            tracing::warn!(record = Self::NAME, skipped = total - values.len(), "skipping keyless records");
        }
        for value in &values {
            check(value)?;
        }
        Ok(values)
    }
}

fn parse<T: DeserializeOwned>(bytes: &[u8], record: &'static str) -> Result<T, NetworkError> {
    serde_json::from_slice(bytes).map_err(|error| {
        tracing::debug!(record, %error, "payload rejected by decoder");
        NetworkError::DecodingFailed
    })
}

fn check<T: ApiRecord>(value: &T) -> Result<(), NetworkError> {
    value.validate().map_err(|reason| {
        tracing::debug!(record = T::NAME, %reason, "record failed validation");
        NetworkError::DecodingFailed
    })
}

impl ApiRecord for Asset {
    const NAME: &'static str = "asset";

    fn validate(&self) -> Result<(), String> {
        if self.asset_id.is_empty() {
            return Err(String::from("asset_id is empty"));
        }
        Ok(())
    }

    fn is_keyless(&self) -> bool {
        self.asset_id.is_empty()
    }
}

impl ApiRecord for AssetIcon {
    const NAME: &'static str = "asset_icon";
}

impl ApiRecord for ExchangeRate {
    const NAME: &'static str = "exchange_rate";

    fn validate(&self) -> Result<(), String> {
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(format!("rate must be positive, got {}", self.rate));
        }
        Ok(())
    }
}

impl ApiRecord for TimeSeriesData {
    const NAME: &'static str = "time_series_data";
}

impl ApiRecord for ServerErrorEnvelope {
    const NAME: &'static str = "server_error";
}
