use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::model::LocationSalt;

/// Canonical rendering for every timestamp written by the transformers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decompose to NFD and drop combining marks, so `"Máquina"` becomes `"Maquina"`.
pub fn remove_accents(text: &str) -> String {
    text.nfd().filter(|ch| !is_combining_mark(*ch)).collect()
}

/// Trim, turn a decimal comma into a point and patch dangling points
/// (`".5"` -> `"0.5"`, `"5."` -> `"5.0"`).
pub fn normalize_decimal(value: &str) -> String {
    let mut cleaned = value.trim().replace(',', ".");
    if cleaned.starts_with('.') {
        cleaned.insert(0, '0');
    }
    if cleaned.ends_with('.') {
        cleaned.push('0');
    }
    cleaned
}

/// Values that can be read as a float without raising.
pub trait TolerantFloat {
    fn to_tolerant_float(&self) -> Option<f64>;
}

impl TolerantFloat for str {
    fn to_tolerant_float(&self) -> Option<f64> {
        let cleaned = normalize_decimal(self);
        if cleaned.is_empty() {
            return None;
        }
        cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
    }
}

impl TolerantFloat for String {
    fn to_tolerant_float(&self) -> Option<f64> {
        self.as_str().to_tolerant_float()
    }
}

impl TolerantFloat for f64 {
    fn to_tolerant_float(&self) -> Option<f64> {
        Some(*self).filter(|value| value.is_finite())
    }
}

impl<T: TolerantFloat + ?Sized> TolerantFloat for Option<&T> {
    fn to_tolerant_float(&self) -> Option<f64> {
        (*self).and_then(|value| value.to_tolerant_float())
    }
}

pub fn parse_tolerant_float<T: TolerantFloat + ?Sized>(value: &T) -> Option<f64> {
    value.to_tolerant_float()
}

/// Cell coercion used by the weather series: empty and NaN cells become null,
/// numbers are re-rendered, anything else is kept as the cleaned text.
pub fn coerce_numeric_text(value: &str) -> Option<String> {
    let cleaned = normalize_decimal(value);
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(parsed) if parsed.is_nan() => None,
        Ok(parsed) => Some(render_float(parsed)),
        Err(_) => Some(cleaned),
    }
}

/// Shortest round-trip text for a float, always carrying a fractional part for
/// integral values (`12.0`, `0.5`, `1e-7`).
pub fn render_float(value: f64) -> String {
    format!("{value:?}")
}

/// Parse the supported timestamp spellings, first match wins, and render them
/// as `YYYY-MM-DD HH:MM:SS`.
pub fn parse_tolerant_datetime(value: &str) -> Option<String> {
    static DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    static DATE_FORMATS: &[&str] = &["%Y-%m-%d"];

    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.format(TIMESTAMP_FORMAT).to_string());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string());
        }
    }
    None
}

/// Salted SHA-256 of `salt::location`, hex encoded. Blank locations are never
/// hashed and come back empty.
pub fn anonymize_location(location: Option<&str>, salt: &LocationSalt) -> String {
    let Some(trimmed) = location.map(str::trim).filter(|loc| !loc.is_empty()) else {
        return String::new();
    };
    let mut hasher = Sha256::new();
    hasher.update(salt.as_str().as_bytes());
    hasher.update(b"::");
    hasher.update(trimmed.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Integer coercion through a float, truncating toward zero (`"9.0"` -> 9).
pub(crate) fn coerce_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Some(parsed);
    }
    let parsed = trimmed.to_tolerant_float()?;
    if parsed.is_finite() {
        Some(parsed.trunc() as i64)
    } else {
        None
    }
}

/// Strict integer coercion: integral floats are accepted, fractional ones are not.
pub(crate) fn parse_integral(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Some(parsed);
    }
    let parsed = trimmed.parse::<f64>().ok()?;
    if parsed.is_finite() && parsed.fract() == 0.0 {
        Some(parsed as i64)
    } else {
        None
    }
}
