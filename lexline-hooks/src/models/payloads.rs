//! Webhook payloads and their validated forms
//!
//! Each endpoint deserializes into a permissive `*Payload` struct (every
//! field optional) and then validates into the internal event type. Keeping
//! the two apart lets validation failures map to 400 with a precise message
//! instead of a serde error.

use chrono::{DateTime, TimeZone, Utc};
use lexline_common::phone::{normalize_optional, normalize_phone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Webhook source, the first component of the ledger key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Voice-AI provider (conversation lifecycle webhooks)
    ElevenLabs,
    /// Telephony provider (call status callbacks)
    Twilio,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::ElevenLabs => "elevenlabs",
            Provider::Twilio => "twilio",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const EVENT_INBOUND: &str = "call.inbound";
pub const EVENT_POST_CALL: &str = "call.post_call";

/// Payload validation failure (HTTP 400)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("at least one of {0} is required")]
    MissingIdentifier(&'static str),

    #[error("unparseable phone number in field: {0}")]
    InvalidPhone(&'static str),
}

/// Correlation metadata attached by the system that placed the call
///
/// Accepts both camelCase and snake_case keys; other keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(default, alias = "interactionId")]
    pub interaction_id: Option<String>,
    #[serde(default, alias = "callId")]
    pub call_id: Option<String>,
}

/// `POST /webhooks/voice/inbound` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundCallPayload {
    pub caller_id: Option<String>,
    pub called_number: Option<String>,
    pub call_sid: Option<String>,
    pub conversation_id: Option<String>,
    pub client_data: Option<ClientData>,
}

/// Validated call-start event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCall {
    pub caller_e164: String,
    pub called_e164: String,
    pub call_sid: Option<String>,
    pub conversation_id: Option<String>,
}

impl InboundCall {
    /// Ledger external id: the conversation id when present, else the call sid
    pub fn external_id(&self) -> &str {
        self.conversation_id
            .as_deref()
            .or(self.call_sid.as_deref())
            .unwrap_or_default()
    }
}

impl InboundCallPayload {
    pub fn validate(self) -> Result<InboundCall, ValidationError> {
        let call_sid = non_empty(self.call_sid);
        let conversation_id = non_empty(self.conversation_id);
        if call_sid.is_none() && conversation_id.is_none() {
            return Err(ValidationError::MissingIdentifier("call_sid, conversation_id"));
        }

        let caller_raw = non_empty(self.caller_id).ok_or(ValidationError::MissingField("caller_id"))?;
        let called_raw =
            non_empty(self.called_number).ok_or(ValidationError::MissingField("called_number"))?;

        let caller_e164 =
            normalize_phone(&caller_raw).ok_or(ValidationError::InvalidPhone("caller_id"))?;
        let called_e164 =
            normalize_phone(&called_raw).ok_or(ValidationError::InvalidPhone("called_number"))?;

        Ok(InboundCall {
            caller_e164,
            called_e164,
            call_sid,
            conversation_id,
        })
    }
}

/// One turn of a structured transcript
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptTurn {
    pub role: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /webhooks/voice/post-call` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostCallPayload {
    pub conversation_id: Option<String>,
    pub call_sid: Option<String>,
    /// Seconds, as a number or a numeric string
    pub duration_seconds: Option<Value>,
    pub transcript: Option<String>,
    pub transcript_json: Option<Vec<TranscriptTurn>>,
    pub summary: Option<String>,
    pub extracted_data: Option<Map<String, Value>>,
    pub outcome: Option<String>,
    pub recording_url: Option<String>,
    /// RFC 3339 string or unix seconds
    pub ended_at: Option<Value>,
    pub caller_id: Option<String>,
    pub called_number: Option<String>,
    pub client_data: Option<ClientData>,
}

impl PostCallPayload {
    pub fn validate(self) -> Result<CallEndEvent, ValidationError> {
        let conversation_id = non_empty(self.conversation_id)
            .ok_or(ValidationError::MissingField("conversation_id"))?;

        let transcript_text = non_empty(self.transcript)
            .or_else(|| self.transcript_json.as_deref().and_then(flatten_transcript));

        let call_sid = non_empty(self.call_sid);

        Ok(CallEndEvent {
            provider: Provider::ElevenLabs,
            external_id: conversation_id.clone(),
            event_type: EVENT_POST_CALL.to_string(),
            keys: CorrelationKeys::new(
                self.client_data.unwrap_or_default(),
                Some(conversation_id.clone()),
                call_sid.clone(),
            ),
            caller_e164: normalize_optional(self.caller_id.as_deref()),
            called_e164: normalize_optional(self.called_number.as_deref()),
            terminal: true,
            enrichment: CallEnrichment {
                duration_seconds: self.duration_seconds.as_ref().and_then(value_as_seconds),
                call_outcome: non_empty(self.outcome).map(|o| o.to_ascii_lowercase()),
                transcript_text,
                recording_url: non_empty(self.recording_url),
                ai_summary: non_empty(self.summary),
                ended_at: self.ended_at.as_ref().and_then(parse_event_time),
                elevenlabs_id: Some(conversation_id),
                twilio_call_sid: call_sid,
            },
            extracted_data: self.extracted_data.filter(|m| !m.is_empty()),
        })
    }
}

/// `POST /webhooks/telephony/status` body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelephonyStatusPayload {
    pub call_sid: Option<String>,
    pub call_status: Option<String>,
    /// Seconds; providers send either a string or a number
    pub call_duration: Option<Value>,
    pub recording_url: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub client_data: Option<ClientData>,
}

impl TelephonyStatusPayload {
    pub fn validate(self) -> Result<CallEndEvent, ValidationError> {
        let call_sid = non_empty(self.call_sid).ok_or(ValidationError::MissingField("call_sid"))?;
        let status = non_empty(self.call_status)
            .ok_or(ValidationError::MissingField("call_status"))?
            .to_ascii_lowercase();

        let outcome = terminal_outcome(&status);
        let terminal = outcome.is_some();

        let enrichment = CallEnrichment {
            duration_seconds: if terminal {
                self.call_duration.as_ref().and_then(value_as_seconds)
            } else {
                None
            },
            call_outcome: outcome.map(str::to_string),
            transcript_text: None,
            recording_url: non_empty(self.recording_url),
            ai_summary: None,
            ended_at: if terminal { Some(Utc::now()) } else { None },
            elevenlabs_id: None,
            twilio_call_sid: Some(call_sid.clone()),
        };

        Ok(CallEndEvent {
            provider: Provider::Twilio,
            external_id: call_sid.clone(),
            event_type: format!("call.status.{}", status),
            keys: CorrelationKeys::new(self.client_data.unwrap_or_default(), None, Some(call_sid)),
            caller_e164: normalize_optional(self.from.as_deref()),
            called_e164: normalize_optional(self.to.as_deref()),
            terminal,
            enrichment,
            extracted_data: None,
        })
    }
}

/// Map a telephony status to a call outcome; `None` for non-terminal statuses
pub fn terminal_outcome(status: &str) -> Option<&'static str> {
    match status {
        "completed" => Some("connected"),
        "busy" => Some("busy"),
        "no-answer" | "no_answer" => Some("no_answer"),
        "failed" => Some("failed"),
        "canceled" | "cancelled" => Some("canceled"),
        _ => None,
    }
}

/// Every correlation key a call-end event carries, in cascade order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationKeys {
    pub interaction_id: Option<String>,
    pub client_call_id: Option<String>,
    pub conversation_id: Option<String>,
    pub call_sid: Option<String>,
}

impl CorrelationKeys {
    pub fn new(client_data: ClientData, conversation_id: Option<String>, call_sid: Option<String>) -> Self {
        Self {
            interaction_id: non_empty(client_data.interaction_id),
            client_call_id: non_empty(client_data.call_id),
            conversation_id: non_empty(conversation_id),
            call_sid: non_empty(call_sid),
        }
    }
}

/// Values a call-end event offers to the Call record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEnrichment {
    pub duration_seconds: Option<i64>,
    pub call_outcome: Option<String>,
    pub transcript_text: Option<String>,
    pub recording_url: Option<String>,
    pub ai_summary: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elevenlabs_id: Option<String>,
    pub twilio_call_sid: Option<String>,
}

/// Validated call-end (post-call or status) event
#[derive(Debug, Clone)]
pub struct CallEndEvent {
    pub provider: Provider,
    pub external_id: String,
    pub event_type: String,
    pub keys: CorrelationKeys,
    /// Only used for masked diagnostics
    pub caller_e164: Option<String>,
    pub called_e164: Option<String>,
    /// The call is over (closes the interaction)
    pub terminal: bool,
    pub enrichment: CallEnrichment,
    /// Provider-extracted data for the Lead's map
    pub extracted_data: Option<Map<String, Value>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Join transcript turns as `role: message` lines, skipping empty turns
fn flatten_transcript(turns: &[TranscriptTurn]) -> Option<String> {
    let lines: Vec<String> = turns
        .iter()
        .filter_map(|turn| {
            let message = turn.message.as_deref()?.trim();
            if message.is_empty() {
                None
            } else {
                Some(format!("{}: {}", turn.role, message))
            }
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn parse_event_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            }),
        _ => None,
    }
}

fn value_as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
    .filter(|secs| *secs >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_requires_an_identifier() {
        let payload: InboundCallPayload = serde_json::from_value(json!({
            "caller_id": "+15551234567",
            "called_number": "+15559990000"
        }))
        .unwrap();

        assert_eq!(
            payload.validate(),
            Err(ValidationError::MissingIdentifier("call_sid, conversation_id"))
        );
    }

    #[test]
    fn test_inbound_rejects_unparseable_phone() {
        let payload: InboundCallPayload = serde_json::from_value(json!({
            "caller_id": "anonymous",
            "called_number": "+15559990000",
            "call_sid": "CA1"
        }))
        .unwrap();

        assert_eq!(payload.validate(), Err(ValidationError::InvalidPhone("caller_id")));
    }

    #[test]
    fn test_inbound_normalizes_numbers() {
        let payload: InboundCallPayload = serde_json::from_value(json!({
            "caller_id": "(555) 123-4567",
            "called_number": "1-555-999-0000",
            "conversation_id": "conv_1"
        }))
        .unwrap();

        let call = payload.validate().unwrap();
        assert_eq!(call.caller_e164, "+15551234567");
        assert_eq!(call.called_e164, "+15559990000");
        assert_eq!(call.external_id(), "conv_1");
    }

    #[test]
    fn test_client_data_accepts_both_key_styles() {
        let camel: ClientData =
            serde_json::from_value(json!({"interactionId": "i-1", "callId": "c-1"})).unwrap();
        let snake: ClientData =
            serde_json::from_value(json!({"interaction_id": "i-1", "call_id": "c-1", "other": 3}))
                .unwrap();

        assert_eq!(camel.interaction_id.as_deref(), Some("i-1"));
        assert_eq!(snake.call_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_post_call_requires_conversation_id() {
        let payload: PostCallPayload =
            serde_json::from_value(json!({"call_sid": "CA1", "outcome": "connected"})).unwrap();
        assert_eq!(
            payload.validate().err(),
            Some(ValidationError::MissingField("conversation_id"))
        );
    }

    #[test]
    fn test_post_call_flattens_structured_transcript() {
        let payload: PostCallPayload = serde_json::from_value(json!({
            "conversation_id": "conv_1",
            "transcript_json": [
                {"role": "agent", "message": "How can I help?"},
                {"role": "user", "message": null},
                {"role": "user", "message": "I was in an accident."}
            ],
            "duration_seconds": 95.6,
            "ended_at": 1730000000
        }))
        .unwrap();

        let event = payload.validate().unwrap();
        assert_eq!(
            event.enrichment.transcript_text.as_deref(),
            Some("agent: How can I help?\nuser: I was in an accident.")
        );
        assert_eq!(event.enrichment.duration_seconds, Some(96));
        assert_eq!(
            event.enrichment.ended_at.map(|t| t.timestamp()),
            Some(1_730_000_000)
        );
        assert_eq!(event.event_type, EVENT_POST_CALL);
    }

    #[test]
    fn test_post_call_duration_accepts_numeric_strings() {
        for (raw, expected) in [
            (json!("95"), Some(95)),
            (json!(" 95.6 "), Some(96)),
            (json!(42), Some(42)),
            (json!(-3), None),
            (json!("soon"), None),
        ] {
            let payload: PostCallPayload = serde_json::from_value(json!({
                "conversation_id": "conv_1",
                "duration_seconds": raw
            }))
            .unwrap();
            assert_eq!(payload.validate().unwrap().enrichment.duration_seconds, expected);
        }
    }

    #[test]
    fn test_status_event_type_includes_status() {
        let payload: TelephonyStatusPayload = serde_json::from_value(json!({
            "call_sid": "CA9",
            "call_status": "completed",
            "call_duration": "42"
        }))
        .unwrap();

        let event = payload.validate().unwrap();
        assert_eq!(event.provider, Provider::Twilio);
        assert_eq!(event.event_type, "call.status.completed");
        assert!(event.terminal);
        assert_eq!(event.enrichment.call_outcome.as_deref(), Some("connected"));
        assert_eq!(event.enrichment.duration_seconds, Some(42));
    }

    #[test]
    fn test_non_terminal_status_carries_no_outcome() {
        let payload: TelephonyStatusPayload = serde_json::from_value(json!({
            "call_sid": "CA9",
            "call_status": "ringing",
            "call_duration": 0
        }))
        .unwrap();

        let event = payload.validate().unwrap();
        assert!(!event.terminal);
        assert_eq!(event.enrichment.call_outcome, None);
        assert_eq!(event.enrichment.duration_seconds, None);
        assert_eq!(event.enrichment.ended_at, None);
    }
}
