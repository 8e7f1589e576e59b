//! Attention Scan Velocity: seconds between QR display and scan.

use serde::{Serialize, Serializer};

use crate::domain::foundation::Timestamp;

/// Quality tier for a single scan velocity measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AsvTier {
    NotApplicable,
    Low,
    Fair,
    Average,
    Strong,
    Exceptional,
}

impl AsvTier {
    /// Classifies a delta in seconds. Upper bounds are inclusive.
    pub fn classify(delta_secs: f64) -> Self {
        if delta_secs.is_nan() || delta_secs <= 0.0 {
            AsvTier::NotApplicable
        } else if delta_secs <= 5.0 {
            AsvTier::Exceptional
        } else if delta_secs <= 10.0 {
            AsvTier::Strong
        } else if delta_secs <= 20.0 {
            AsvTier::Average
        } else if delta_secs <= 40.0 {
            AsvTier::Fair
        } else {
            AsvTier::Low
        }
    }

    /// Numeric tier, 0 (N/A) through 5 (Exceptional).
    pub fn value(&self) -> u8 {
        match self {
            AsvTier::NotApplicable => 0,
            AsvTier::Low => 1,
            AsvTier::Fair => 2,
            AsvTier::Average => 3,
            AsvTier::Strong => 4,
            AsvTier::Exceptional => 5,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Some(match value {
            0 => AsvTier::NotApplicable,
            1 => AsvTier::Low,
            2 => AsvTier::Fair,
            3 => AsvTier::Average,
            4 => AsvTier::Strong,
            5 => AsvTier::Exceptional,
            _ => return None,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AsvTier::NotApplicable => "N/A",
            AsvTier::Low => "Low",
            AsvTier::Fair => "Fair",
            AsvTier::Average => "Average",
            AsvTier::Strong => "Strong",
            AsvTier::Exceptional => "Exceptional",
        }
    }
}

impl Serialize for AsvTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

/// A measured scan velocity and its tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanVelocity {
    pub seconds: f64,
    pub tier: AsvTier,
    pub label: &'static str,
}

impl ScanVelocity {
    /// Builds a measurement from a delta in seconds.
    pub fn from_seconds(seconds: f64) -> Self {
        let tier = AsvTier::classify(seconds);
        Self {
            seconds,
            tier,
            label: tier.label(),
        }
    }

    /// Measures from the impression's QR display time, falling back to the
    /// impression's event time, up to the conversion time.
    pub fn measure(
        qr_displayed_at: Option<Timestamp>,
        impression_time: Timestamp,
        conversion_time: Timestamp,
    ) -> Self {
        let shown = qr_displayed_at.unwrap_or(impression_time);
        Self::from_seconds(conversion_time.seconds_since(&shown))
    }

    /// True when the measurement is usable for averaging.
    pub fn is_measurable(&self) -> bool {
        self.tier != AsvTier::NotApplicable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_examples() {
        assert_eq!(AsvTier::classify(3.0), AsvTier::Exceptional);
        assert_eq!(AsvTier::classify(7.0), AsvTier::Strong);
        assert_eq!(AsvTier::classify(15.0), AsvTier::Average);
        assert_eq!(AsvTier::classify(30.0), AsvTier::Fair);
        assert_eq!(AsvTier::classify(50.0), AsvTier::Low);
    }

    #[test]
    fn boundaries_are_upper_inclusive() {
        assert_eq!(AsvTier::classify(0.0), AsvTier::NotApplicable);
        assert_eq!(AsvTier::classify(0.001), AsvTier::Exceptional);
        assert_eq!(AsvTier::classify(5.0), AsvTier::Exceptional);
        assert_eq!(AsvTier::classify(5.001), AsvTier::Strong);
        assert_eq!(AsvTier::classify(10.0), AsvTier::Strong);
        assert_eq!(AsvTier::classify(20.0), AsvTier::Average);
        assert_eq!(AsvTier::classify(40.0), AsvTier::Fair);
        assert_eq!(AsvTier::classify(40.001), AsvTier::Low);
    }

    #[test]
    fn negative_delta_is_not_applicable() {
        assert_eq!(AsvTier::classify(-12.0), AsvTier::NotApplicable);
        assert_eq!(AsvTier::classify(f64::NAN), AsvTier::NotApplicable);
    }

    #[test]
    fn value_roundtrip() {
        for v in 0..=5 {
            assert_eq!(AsvTier::from_value(v).unwrap().value(), v);
        }
        assert!(AsvTier::from_value(6).is_none());
    }

    #[test]
    fn measure_prefers_qr_display_time() {
        let impression = Timestamp::parse_rfc3339("2026-05-01T10:00:00Z").unwrap();
        let shown = Timestamp::parse_rfc3339("2026-05-01T10:00:10Z").unwrap();
        let scanned = Timestamp::parse_rfc3339("2026-05-01T10:00:13Z").unwrap();

        let with_qr = ScanVelocity::measure(Some(shown), impression, scanned);
        assert_eq!(with_qr.seconds, 3.0);
        assert_eq!(with_qr.tier, AsvTier::Exceptional);

        let fallback = ScanVelocity::measure(None, impression, scanned);
        assert_eq!(fallback.seconds, 13.0);
        assert_eq!(fallback.tier, AsvTier::Average);
    }

    #[test]
    fn serializes_tier_as_number() {
        let v = ScanVelocity::from_seconds(7.0);
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["tier"], 4);
        assert_eq!(json["label"], "Strong");
        assert_eq!(json["seconds"], 7.0);
    }
}
