//! Lenient numeric decoding for values authored in forms or reported by the
//! ad platform as strings.
//!
//! Anything that is not a finite number (missing, `null`, `""`, `"abc"`)
//! decodes to `0.0`.

use serde::{Deserialize, Deserializer};

/// Parse a textual metric value, falling back to `0.0`.
#[must_use]
pub fn parse_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Like [`parse_number`] for optional text.
#[must_use]
pub fn parse_optional_number(raw: Option<&str>) -> f64 {
    raw.map_or(0.0, parse_number)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// `#[serde(deserialize_with = "lenient::number")]` helper.
///
/// # Errors
///
/// Never fails on malformed content; only propagates deserializer-level errors.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrText::Number(n)) if n.is_finite() => n,
        Some(NumberOrText::Text(text)) => parse_number(&text),
        _ => 0.0,
    })
}
