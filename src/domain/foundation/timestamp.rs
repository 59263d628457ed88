//! Timestamp value object for immutable points in time.
//!
//! Serialized as fixed-width RFC 3339 (microsecond precision, `Z` suffix) so
//! that lexicographic order of the stored string equals chronological order.
//! Document stores sort on that string.

use chrono::{DateTime, Duration, Months, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Creates a timestamp from Unix seconds. Returns `None` when out of range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Parses an RFC 3339 string (any offset), normalizing to UTC.
    pub fn parse_rfc3339(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Parses the loose formats payment providers send: RFC 3339, a bare
    /// `YYYY-MM-DD HH:MM:SS` (assumed UTC), or Unix seconds/milliseconds.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(ts) = Self::parse_rfc3339(raw) {
            return Some(ts);
        }
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(Self(naive.and_utc()));
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0).map(|dt| Self(dt.and_utc()));
        }
        raw.parse::<i64>().ok().and_then(Self::from_epoch_number)
    }

    /// Interprets an epoch number, accepting either seconds or milliseconds.
    pub fn from_epoch_number(value: i64) -> Option<Self> {
        // Anything past year 5138 in seconds is assumed to be milliseconds.
        if value.abs() >= 100_000_000_000 {
            Utc.timestamp_millis_opt(value).single().map(Self)
        } else {
            Self::from_unix_secs(value)
        }
    }

    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    pub fn add_days(&self, days: i64) -> Option<Self> {
        self.0.checked_add_signed(Duration::days(days)).map(Self)
    }

    pub fn add_minutes(&self, minutes: i64) -> Option<Self> {
        self.0.checked_add_signed(Duration::minutes(minutes)).map(Self)
    }

    /// Calendar-aware month addition.
    ///
    /// Lands on the same day of month when it exists, otherwise on the last
    /// day of the target month (Jan 31 + 1 month = Feb 29 in a leap year).
    pub fn add_months(&self, months: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(months)).map(Self)
    }

    /// Calendar-aware year addition (Feb 29 + 1 year = Feb 28).
    pub fn add_years(&self, years: u32) -> Option<Self> {
        years.checked_mul(12).and_then(|m| self.add_months(m))
    }

    /// Canonical storage form.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_rfc3339(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RFC 3339 timestamp: {}", raw)))
    }
}
