//! Timestamp handling for API payloads and cached records.
//!
//! The market-data API serves timestamps with exactly seven fractional digits
//! and a zone designator, e.g. `2024-03-01T12:30:00.1234567Z` or
//! `2024-03-01T12:30:00.1234567+02:00`. Cached records use plain RFC 3339.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Length of `yyyy-MM-ddTHH:mm:ss.fffffff`.
const BODY_LEN: usize = 27;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp '{value}'")]
pub struct TimestampError {
    value: String,
}

impl TimestampError {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_owned(),
        }
    }
}

/// Parse an API timestamp with seven fractional digits and a zone designator.
pub fn parse_api_timestamp(input: &str) -> Result<OffsetDateTime, TimestampError> {
    let (body, zone) = match (input.get(..BODY_LEN), input.get(BODY_LEN..)) {
        (Some(body), Some(zone)) if !zone.is_empty() => (body, zone),
        _ => return Err(TimestampError::new(input)),
    };

    let local = PrimitiveDateTime::parse(
        body,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:7]"),
    )
    .map_err(|_| TimestampError::new(input))?;
    let offset = parse_zone(zone).ok_or_else(|| TimestampError::new(input))?;

    Ok(local.assume_offset(offset))
}

/// `Z`, `±hh`, `±hhmm` or `±hh:mm`.
fn parse_zone(zone: &str) -> Option<UtcOffset> {
    if zone == "Z" {
        return Some(UtcOffset::UTC);
    }

    let sign: i8 = match zone.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = &zone[1..];
    if !digits.is_ascii() {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits, "00"),
        4 => (&digits[..2], &digits[2..]),
        5 if digits.as_bytes()[2] == b':' => (&digits[..2], &digits[3..]),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i8 = hours.parse().ok()?;
    let minutes: i8 = minutes.parse().ok()?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

/// Format a timestamp for cache storage and query strings.
pub fn format_rfc3339(value: OffsetDateTime) -> String {
    value
        .to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}

/// Parse a timestamp written by [`format_rfc3339`].
pub fn parse_rfc3339(input: &str) -> Result<OffsetDateTime, TimestampError> {
    OffsetDateTime::parse(input, &Rfc3339).map_err(|_| TimestampError::new(input))
}

/// Serde adapter for required API timestamps.
pub mod api_timestamp {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_api_timestamp(&raw).map_err(D::Error::custom)
    }

    /// Serde adapter for optional API timestamps; `null` and absent decode to `None`.
    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse_api_timestamp(&raw))
                .transpose()
                .map_err(D::Error::custom)
        }
    }
}
