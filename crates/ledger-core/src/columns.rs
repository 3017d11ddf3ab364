// Serde adapters for the flat CSV snapshot columns.
//
// The snapshot tables are plain CSV, so timestamps are written in a fixed
// `YYYY-MM-DD HH:MM:SS` layout and the payout mapping is embedded as a JSON
// object literal inside a single column.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};

/// Layout used for every timestamp column (`tournament_date`, `scraped_date`).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp written with [`DATETIME_FORMAT`].
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
}

/// Format a timestamp with [`DATETIME_FORMAT`].
pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub mod datetime {
    use super::*;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_datetime(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_datetime(&raw).map_err(serde::de::Error::custom)
    }
}

/// Like [`datetime`], but an empty cell means "not known yet".
pub mod optional_datetime {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => s.serialize_str(&format_datetime(dt)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        parse_datetime(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Optional count column. Accepts `"10"` and the float form `"10.0"` that
/// spreadsheet tools write for integer columns with gaps.
pub mod optional_count {
    use super::*;
    use serde::Serialize;

    pub fn serialize<S: Serializer>(value: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        value.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        parse_count_cell(raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("`{raw}` is not a whole count")))
    }
}

/// Parse `"10"` or `"10.0"`; fractional or negative values are rejected.
pub fn parse_count_cell(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let value: f64 = raw.parse().ok()?;
    if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
        Some(value as u32)
    } else {
        None
    }
}

/// The ordered payout mapping, stored as a JSON object literal.
pub mod payout_literal {
    use super::*;
    use crate::payout::PayoutTable;

    pub fn serialize<S: Serializer>(value: &PayoutTable, s: S) -> Result<S::Ok, S::Error> {
        let json = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        s.serialize_str(&json)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PayoutTable, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(PayoutTable::default());
        }
        serde_json::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
