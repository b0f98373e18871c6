//! Column encodings shared by the repositories.
//!
//! Timestamps are stored as RFC 3339 text with a fixed precision and a `Z`
//! suffix so that string comparison in SQL orders them correctly. Dates are
//! stored as `YYYY-MM-DD`.

use chrono::{NaiveDate, SecondsFormat};
use serde::de::DeserializeOwned;

use adpilot_domain::time::Timestamp;

pub(crate) fn decode_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

pub(crate) fn encode_ts(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.to_utc())
        .map_err(decode_error)
}

pub(crate) fn decode_opt_ts(raw: Option<String>) -> Result<Option<Timestamp>, sqlx::Error> {
    raw.as_deref().map(decode_ts).transpose()
}

pub(crate) fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(decode_error)
}

/// Decode a JSON column, falling back to the default when it is malformed.
pub(crate) fn lenient_json<T>(table: &str, column: &str, raw: &str) -> T
where
    T: DeserializeOwned + Default,
{
    if raw.trim().is_empty() {
        return T::default();
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        tracing::warn!(table, column, error = %err, "malformed JSON column, using default");
        T::default()
    })
}

/// Decode a JSON array column element by element, dropping only the
/// elements that are malformed.
pub(crate) fn lenient_json_list<T>(table: &str, column: &str, raw: &str) -> Vec<T>
where
    T: DeserializeOwned,
{
    let items: Vec<serde_json::Value> = lenient_json(table, column, raw);
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            serde_json::from_value(item)
                .inspect_err(|err| {
                    tracing::warn!(table, column, index, error = %err, "malformed JSON element, skipping");
                })
                .ok()
        })
        .collect()
}
