//! Typed ingestion events produced by the validator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{CampaignId, EventId, OpportunityId, Timestamp};

/// Discriminator carried in the `event_type` field of every submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PauseImpression,
    QrConversion,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PauseImpression => "pause_impression",
            EventType::QrConversion => "qr_conversion",
        }
    }

    /// Top-level fields that must be present for this kind of event.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            EventType::PauseImpression => &[
                "event_id",
                "event_time_utc",
                "publisher",
                "session",
                "content",
                "ad",
            ],
            EventType::QrConversion => &[
                "event_id",
                "event_time_utc",
                "publisher",
                "session",
                "conversion",
            ],
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause_impression" => Ok(EventType::PauseImpression),
            "qr_conversion" => Ok(EventType::QrConversion),
            _ => Err(()),
        }
    }
}

/// Outcome the publisher reports for a QR scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionResult {
    #[default]
    Success,
    Failure,
}

impl ConversionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionResult::Success => "success",
            ConversionResult::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success)
    }
}

impl FromStr for ConversionResult {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ConversionResult::Success),
            "failure" => Ok(ConversionResult::Failure),
            _ => Err(()),
        }
    }
}

/// A structurally valid pause impression.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionEvent {
    pub event_id: EventId,
    pub event_time: Timestamp,
    pub opportunity_id: OpportunityId,
    pub campaign_id: CampaignId,
    pub creative_id: Option<String>,
    pub program_id: Option<String>,
    pub qr_displayed_at: Option<Timestamp>,
    pub payload: serde_json::Value,
}

/// A structurally valid QR conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub event_id: EventId,
    pub event_time: Timestamp,
    pub opportunity_id: OpportunityId,
    pub result: ConversionResult,
    pub payload: serde_json::Value,
}

/// Either kind of validated event.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    Impression(ImpressionEvent),
    Conversion(ConversionEvent),
}

impl IngestEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            IngestEvent::Impression(_) => EventType::PauseImpression,
            IngestEvent::Conversion(_) => EventType::QrConversion,
        }
    }

    pub fn event_id(&self) -> &EventId {
        match self {
            IngestEvent::Impression(e) => &e.event_id,
            IngestEvent::Conversion(e) => &e.event_id,
        }
    }

    pub fn opportunity_id(&self) -> &OpportunityId {
        match self {
            IngestEvent::Impression(e) => &e.opportunity_id,
            IngestEvent::Conversion(e) => &e.opportunity_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parses_known_names() {
        assert_eq!("pause_impression".parse(), Ok(EventType::PauseImpression));
        assert_eq!("qr_conversion".parse(), Ok(EventType::QrConversion));
        assert!("click".parse::<EventType>().is_err());
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&EventType::QrConversion).unwrap();
        assert_eq!(json, "\"qr_conversion\"");
    }

    #[test]
    fn impression_requires_content_and_ad() {
        let fields = EventType::PauseImpression.required_fields();
        assert!(fields.contains(&"content"));
        assert!(fields.contains(&"ad"));
        assert!(!fields.contains(&"conversion"));
    }

    #[test]
    fn conversion_requires_conversion_block() {
        let fields = EventType::QrConversion.required_fields();
        assert!(fields.contains(&"conversion"));
        assert!(!fields.contains(&"ad"));
    }

    #[test]
    fn conversion_result_defaults_to_success() {
        assert_eq!(ConversionResult::default(), ConversionResult::Success);
        assert!(!ConversionResult::Failure.is_success());
    }
}
