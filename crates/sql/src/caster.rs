//! Text-to-typed-value conversion for bind parameters.

use crate::types::{SqlType, SqlValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use tessera_error::{Result, TesseraError};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Casts a text value to `sql_type`. Absent and empty values become [`SqlValue::Null`].
pub fn cast(value: Option<&str>, sql_type: &SqlType) -> Result<SqlValue> {
    let raw = match value {
        Some(v) if !v.trim().is_empty() => v.trim(),
        _ => return Ok(SqlValue::Null),
    };
    let fail = |reason: &dyn std::fmt::Display| {
        TesseraError::cast(raw, &sql_type.to_string(), reason)
    };

    match sql_type {
        SqlType::Integer => raw.parse::<i32>().map(SqlValue::Int).map_err(|e| fail(&e)),
        SqlType::BigInt => raw.parse::<i64>().map(SqlValue::BigInt).map_err(|e| fail(&e)),
        SqlType::Double => raw.parse::<f64>().map(SqlValue::Double).map_err(|e| fail(&e)),
        SqlType::Decimal => Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map(SqlValue::Decimal)
            .map_err(|e| fail(&e)),
        SqlType::Boolean => parse_bool(raw)
            .map(SqlValue::Bool)
            .ok_or_else(|| fail(&"expected one of 1, 0, true, false")),
        SqlType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(SqlValue::Date)
            .map_err(|e| fail(&e)),
        SqlType::Timestamp => parse_timestamp(raw)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| fail(&"expected an ISO-8601 date-time")),
        SqlType::Text | SqlType::Other(_) => Ok(SqlValue::Text(raw.to_string())),
    }
}

/// Casts a JSON value (INSERT/SET payloads). With no known column type, the JSON kind decides.
pub fn cast_json(value: &serde_json::Value, sql_type: Option<&SqlType>) -> Result<SqlValue> {
    let Some(sql_type) = sql_type else {
        return Ok(SqlValue::from_json(value));
    };
    match value {
        serde_json::Value::Null => Ok(SqlValue::Null),
        serde_json::Value::String(s) => cast(Some(s), sql_type),
        serde_json::Value::Bool(b) if *sql_type == SqlType::Boolean => Ok(SqlValue::Bool(*b)),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Ok(SqlValue::Text(value.to_string()))
        }
        other => cast(Some(&other.to_string()), sql_type),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
