//! Date handling for due dates and datetime fields.
//!
//! Due dates are calendar dates. When a client sends a full timestamp we keep the date portion
//! exactly as written instead of converting through a timezone, which would shift the day for
//! anyone west of UTC submitting late in the evening.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses `YYYY-MM-DD`, or the leading calendar date of an ISO-8601 timestamp.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let date_part = match trimmed.get(..10) {
        Some(prefix) if trimmed.len() == 10 => prefix,
        Some(prefix) if matches!(trimmed.as_bytes().get(10), Some(b'T' | b't' | b' ')) => prefix,
        _ => trimmed,
    };

    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Parses an RFC 3339 timestamp; a bare date means midnight UTC.
pub fn normalize_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("failed to parse '{raw}' as an RFC 3339 timestamp or YYYY-MM-DD"))
}

pub(crate) fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| normalize_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

pub(crate) fn optional_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| normalize_datetime(&value).map_err(serde::de::Error::custom))
        .transpose()
}

pub(crate) fn datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    normalize_datetime(&raw).map_err(serde::de::Error::custom)
}

/// Pair with `#[serde(default)]`: absent stays `None`, `null` becomes `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn nullable_date<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_date(deserializer).map(Some)
}

pub(crate) fn nullable_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_datetime(deserializer).map(Some)
}
