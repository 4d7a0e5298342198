use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// An absolute instant as supplied by the test backend.
///
/// Backends emit either epoch milliseconds or ISO-8601 strings; both are
/// reduced to epoch milliseconds without any timezone conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the UNIX epoch
    EpochMillis(i64),
    /// ISO-8601 / RFC 3339 text (offset optional, UTC assumed when absent)
    Text(String),
    /// Anything else the backend sent (null, floats, objects)
    Malformed(serde_json::Value),
}

impl Timestamp {
    /// Epoch milliseconds, or `None` if the text form cannot be parsed
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Timestamp::EpochMillis(ms) => Some(*ms),
            Timestamp::Text(text) => parse_iso_millis(text),
            Timestamp::Malformed(_) => None,
        }
    }

    /// Epoch milliseconds, falling back to `base_ms` for unparsable text
    pub fn resolve(&self, base_ms: i64) -> i64 {
        match self.epoch_millis() {
            Some(ms) => ms,
            None => {
                tracing::debug!("Unparsable timestamp {:?}, using base time {}", self, base_ms);
                base_ms
            }
        }
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::Malformed(serde_json::Value::Null)
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Timestamp::EpochMillis(ms)
    }
}

impl From<&str> for Timestamp {
    fn from(text: &str) -> Self {
        Timestamp::Text(text.to_string())
    }
}

fn parse_iso_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    // No offset: read as UTC
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Deserialize an optional millisecond count, reading anything unusable as `None`
///
/// Non-negative floats are rounded; negatives, strings and other shapes are dropped.
pub(crate) fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64().or_else(|| {
            v.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f.round() as u64)
        })
    }))
}

/// Base time of a run: the earliest parsable instant, or 0 if none parse
pub fn base_time<'a>(timestamps: impl IntoIterator<Item = &'a Timestamp>) -> i64 {
    timestamps
        .into_iter()
        .filter_map(Timestamp::epoch_millis)
        .min()
        .unwrap_or(0)
}
