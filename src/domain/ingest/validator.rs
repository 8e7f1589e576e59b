//! Structural validation of raw event submissions.
//!
//! Checks run in a fixed order so the caller always gets the most useful
//! error first:
//!
//! 1. `event_type` must name a known kind
//! 2. every required top-level field for that kind must be present
//! 3. `session.opportunity_id` must be present and non-empty
//! 4. present fields must be well-formed

use serde_json::{Map, Value};

use super::errors::IngestError;
use super::event::{ConversionEvent, ConversionResult, EventType, ImpressionEvent, IngestEvent};
use crate::domain::foundation::{CampaignId, EventId, OpportunityId, Timestamp};

/// Validates a parsed request body and produces a typed event.
pub fn validate_event(body: &Value) -> Result<IngestEvent, IngestError> {
    let obj = body
        .as_object()
        .ok_or_else(|| IngestError::InvalidJson("body must be a JSON object".to_string()))?;

    let event_type = obj
        .get("event_type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<EventType>().ok())
        .ok_or(IngestError::InvalidEventType)?;

    let missing: Vec<String> = event_type
        .required_fields()
        .iter()
        .filter(|field| is_absent(obj.get(**field)))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingRequiredFields(missing));
    }

    let session = block(obj, "session")?;
    let opportunity_id = match session.get("opportunity_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => OpportunityId::new(s.as_str())?,
        Some(Value::Number(n)) => OpportunityId::new(n.to_string())?,
        _ => return Err(IngestError::MissingOpportunityId),
    };

    block(obj, "publisher")?;
    let event_id = EventId::new(required_str(obj, "event_id", "event_id")?)?;
    let event_time = timestamp(obj, "event_time_utc", "event_time_utc")?;

    match event_type {
        EventType::PauseImpression => {
            block(obj, "content")?;
            let ad = block(obj, "ad")?;
            let campaign_id = CampaignId::new(required_str(ad, "campaign_id", "ad.campaign_id")?)?;

            Ok(IngestEvent::Impression(ImpressionEvent {
                event_id,
                event_time,
                opportunity_id,
                campaign_id,
                creative_id: optional_str(ad, "creative_id", "ad.creative_id")?,
                program_id: optional_str(ad, "program_id", "ad.program_id")?,
                qr_displayed_at: optional_timestamp(ad, "qr_displayed_at_utc", "ad.qr_displayed_at_utc")?,
                payload: body.clone(),
            }))
        }
        EventType::QrConversion => {
            let conversion = block(obj, "conversion")?;
            let result = match optional_str(conversion, "result", "conversion.result")? {
                None => ConversionResult::default(),
                Some(s) => s.parse().map_err(|_| {
                    IngestError::invalid_field("conversion.result", "expected 'success' or 'failure'")
                })?,
            };

            Ok(IngestEvent::Conversion(ConversionEvent {
                event_id,
                event_time,
                opportunity_id,
                result,
                payload: body.clone(),
            }))
        }
    }
}

/// Reads `publisher.publisher_id` without validating the rest of the body.
///
/// Used by signature authentication when no publisher header is sent.
pub fn publisher_hint(body: &Value) -> Option<&str> {
    body.get("publisher")?.get("publisher_id")?.as_str()
}

/// Reads a top-level `idempotency_key` body field, if present.
pub fn idempotency_key_hint(body: &Value) -> Option<&str> {
    body.get("idempotency_key")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn block<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>, IngestError> {
    obj.get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| IngestError::invalid_field(name, "expected an object"))
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, IngestError> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(IngestError::invalid_field(path, "is required"))
        }
        Some(_) => Err(IngestError::invalid_field(path, "expected a string")),
    }
}

fn optional_str(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<String>, IngestError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(IngestError::invalid_field(path, "expected a string")),
    }
}

fn timestamp(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Timestamp, IngestError> {
    let raw = required_str(obj, key, path)?;
    Timestamp::parse_rfc3339(raw)
        .ok_or_else(|| IngestError::invalid_field(path, "expected an RFC 3339 timestamp"))
}

fn optional_timestamp(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<Timestamp>, IngestError> {
    optional_str(obj, key, path)?
        .map(|raw| {
            Timestamp::parse_rfc3339(&raw)
                .ok_or_else(|| IngestError::invalid_field(path, "expected an RFC 3339 timestamp"))
        })
        .transpose()
}
