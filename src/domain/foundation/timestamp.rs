//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string, normalizing any offset to UTC.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the UTC calendar date of this timestamp.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Returns the signed number of seconds from `earlier` to `self`,
    /// with millisecond precision.
    pub fn seconds_since(&self, earlier: &Timestamp) -> f64 {
        self.0.signed_duration_since(earlier.0).num_milliseconds() as f64 / 1000.0
    }

    /// Creates a new timestamp offset by the given number of seconds.
    ///
    /// Negative values move backwards in time.
    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }

    /// Creates a timestamp from Unix seconds, if in range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Formats as RFC 3339 with millisecond precision and a `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 14, h, m, s).unwrap())
    }

    #[test]
    fn parse_rfc3339_normalizes_offsets() {
        let ts = Timestamp::parse_rfc3339("2026-03-14T12:00:00+02:00").unwrap();
        assert_eq!(ts, at(10, 0, 0));
    }

    #[test]
    fn parse_rfc3339_rejects_garbage() {
        assert!(Timestamp::parse_rfc3339("yesterday").is_none());
    }

    #[test]
    fn seconds_since_is_signed() {
        let a = at(10, 0, 0);
        let b = at(10, 0, 7);
        assert_eq!(b.seconds_since(&a), 7.0);
        assert_eq!(a.seconds_since(&b), -7.0);
    }

    #[test]
    fn seconds_since_keeps_milliseconds() {
        let a = at(10, 0, 0);
        let b = Timestamp::from_datetime(*a.as_datetime() + Duration::milliseconds(2500));
        assert_eq!(b.seconds_since(&a), 2.5);
    }

    #[test]
    fn unix_roundtrip() {
        let ts = at(8, 30, 0);
        assert_eq!(Timestamp::from_unix_secs(ts.as_unix_secs()), Some(ts));
    }

    #[test]
    fn date_uses_utc_calendar() {
        let ts = Timestamp::parse_rfc3339("2026-03-14T23:30:00-05:00").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn to_rfc3339_uses_z_suffix() {
        assert_eq!(at(9, 5, 1).to_rfc3339(), "2026-03-14T09:05:01.000Z");
    }
}
