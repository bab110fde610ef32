//! Guarded merge of call-end data into Calls and Leads
//!
//! Call fields follow a declarative policy table consumed by one generic
//! merge function. The Lead's extracted-data map is a shallow union in which
//! incoming nulls never erase.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::db::calls::{CallRecord, ColumnValue};
use crate::models::CallEnrichment;

/// How an incoming value interacts with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Written only while the stored value is unset
    SetOnceIfUnset,
    /// Written whenever the incoming value is present
    OverwriteIfPresent,
}

/// Call columns that call-end events may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallField {
    DurationSeconds,
    CallOutcome,
    ElevenLabsId,
    TwilioCallSid,
    TranscriptText,
    RecordingUrl,
    AiSummary,
    EndedAt,
}

pub const CALL_FIELD_POLICIES: [(CallField, MergePolicy); 8] = [
    (CallField::DurationSeconds, MergePolicy::SetOnceIfUnset),
    (CallField::CallOutcome, MergePolicy::SetOnceIfUnset),
    (CallField::ElevenLabsId, MergePolicy::SetOnceIfUnset),
    (CallField::TwilioCallSid, MergePolicy::SetOnceIfUnset),
    (CallField::TranscriptText, MergePolicy::OverwriteIfPresent),
    (CallField::RecordingUrl, MergePolicy::OverwriteIfPresent),
    (CallField::AiSummary, MergePolicy::OverwriteIfPresent),
    (CallField::EndedAt, MergePolicy::OverwriteIfPresent),
];

impl CallField {
    pub fn column(&self) -> &'static str {
        match self {
            CallField::DurationSeconds => "duration_seconds",
            CallField::CallOutcome => "call_outcome",
            CallField::ElevenLabsId => "elevenlabs_id",
            CallField::TwilioCallSid => "twilio_call_sid",
            CallField::TranscriptText => "transcript_text",
            CallField::RecordingUrl => "recording_url",
            CallField::AiSummary => "ai_summary",
            CallField::EndedAt => "ended_at",
        }
    }

    fn current(&self, call: &CallRecord) -> Option<ColumnValue> {
        match self {
            CallField::DurationSeconds => call.duration_seconds.map(ColumnValue::Integer),
            CallField::CallOutcome => text(&call.call_outcome),
            CallField::ElevenLabsId => text(&call.elevenlabs_id),
            CallField::TwilioCallSid => text(&call.twilio_call_sid),
            CallField::TranscriptText => text(&call.transcript_text),
            CallField::RecordingUrl => text(&call.recording_url),
            CallField::AiSummary => text(&call.ai_summary),
            CallField::EndedAt => call.ended_at.map(timestamp),
        }
    }

    fn incoming(&self, enrichment: &CallEnrichment) -> Option<ColumnValue> {
        match self {
            CallField::DurationSeconds => enrichment.duration_seconds.map(ColumnValue::Integer),
            CallField::CallOutcome => text(&enrichment.call_outcome),
            CallField::ElevenLabsId => text(&enrichment.elevenlabs_id),
            CallField::TwilioCallSid => text(&enrichment.twilio_call_sid),
            CallField::TranscriptText => text(&enrichment.transcript_text),
            CallField::RecordingUrl => text(&enrichment.recording_url),
            CallField::AiSummary => text(&enrichment.ai_summary),
            CallField::EndedAt => enrichment.ended_at.map(timestamp),
        }
    }
}

fn text(value: &Option<String>) -> Option<ColumnValue> {
    value.clone().map(ColumnValue::Text)
}

fn timestamp(value: DateTime<Utc>) -> ColumnValue {
    ColumnValue::Text(value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Value to write under `policy`, or `None` to leave the field untouched
pub fn merge_value<T: PartialEq>(
    policy: MergePolicy,
    current: Option<&T>,
    incoming: Option<T>,
) -> Option<T> {
    let incoming = incoming?;
    match policy {
        MergePolicy::SetOnceIfUnset if current.is_some() => None,
        _ if current == Some(&incoming) => None,
        _ => Some(incoming),
    }
}

/// Column writes that bring `call` up to date with `enrichment`
pub fn plan_call_update(
    call: &CallRecord,
    enrichment: &CallEnrichment,
) -> Vec<(&'static str, ColumnValue)> {
    CALL_FIELD_POLICIES
        .iter()
        .filter_map(|(field, policy)| {
            let current = field.current(call);
            merge_value(*policy, current.as_ref(), field.incoming(enrichment))
                .map(|value| (field.column(), value))
        })
        .collect()
}

/// Shallow union: incoming non-null keys overwrite, nulls never erase
///
/// Returns whether `existing` changed.
pub fn merge_extracted_data(existing: &mut Map<String, Value>, incoming: &Map<String, Value>) -> bool {
    let mut changed = false;
    for (key, value) in incoming {
        if value.is_null() {
            continue;
        }
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Caller name supplied by the provider, if any
pub fn provider_caller_name(extracted: &Map<String, Value>) -> Option<String> {
    ["callerName", "caller_name"]
        .iter()
        .filter_map(|key| extracted.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use uuid::Uuid;

    fn call() -> CallRecord {
        CallRecord {
            id: Uuid::new_v4(),
            org_id: "org-1".to_string(),
            lead_id: Uuid::new_v4(),
            interaction_id: Uuid::new_v4(),
            phone_number_id: None,
            elevenlabs_id: Some("conv_1".to_string()),
            twilio_call_sid: None,
            caller_number: "+15551234567".to_string(),
            called_number: "+15559990000".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
            call_outcome: None,
            transcript_text: None,
            recording_url: None,
            ai_summary: None,
        }
    }

    #[test]
    fn test_merge_value_policies() {
        assert_eq!(merge_value(MergePolicy::SetOnceIfUnset, None, Some(5)), Some(5));
        assert_eq!(merge_value(MergePolicy::SetOnceIfUnset, Some(&3), Some(5)), None);
        assert_eq!(merge_value(MergePolicy::OverwriteIfPresent, Some(&3), Some(5)), Some(5));
        assert_eq!(merge_value(MergePolicy::OverwriteIfPresent, Some(&3), None), None);
        assert_eq!(merge_value(MergePolicy::OverwriteIfPresent, Some(&5), Some(5)), None);
    }

    #[test]
    fn test_outcome_set_first_is_kept() {
        let mut existing = call();
        existing.call_outcome = Some("connected".to_string());
        existing.duration_seconds = Some(120);

        let enrichment = CallEnrichment {
            call_outcome: Some("failed".to_string()),
            duration_seconds: Some(3),
            transcript_text: Some("agent: hello".to_string()),
            ..Default::default()
        };

        let patch = plan_call_update(&existing, &enrichment);
        assert_eq!(
            patch,
            vec![("transcript_text", ColumnValue::Text("agent: hello".to_string()))]
        );
    }

    #[test]
    fn test_refreshable_fields_overwrite_and_keys_fill_in() {
        let mut existing = call();
        existing.recording_url = Some("https://rec/old".to_string());
        let ended = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let enrichment = CallEnrichment {
            recording_url: Some("https://rec/new".to_string()),
            ended_at: Some(ended),
            elevenlabs_id: Some("conv_other".to_string()),
            twilio_call_sid: Some("CA1".to_string()),
            ..Default::default()
        };

        let patch = plan_call_update(&existing, &enrichment);
        assert_eq!(
            patch,
            vec![
                ("twilio_call_sid", ColumnValue::Text("CA1".to_string())),
                ("recording_url", ColumnValue::Text("https://rec/new".to_string())),
                ("ended_at", ColumnValue::Text("2026-03-01T12:00:00Z".to_string())),
            ]
        );
    }

    #[test]
    fn test_extracted_data_nulls_never_erase() {
        let mut existing = json!({"callerName": "Jane", "injury": "back"})
            .as_object()
            .cloned()
            .unwrap();
        let incoming = json!({"injury": null, "date": "May 3"}).as_object().cloned().unwrap();

        assert!(merge_extracted_data(&mut existing, &incoming));
        assert_eq!(
            Value::Object(existing),
            json!({"callerName": "Jane", "injury": "back", "date": "May 3"})
        );
    }

    #[test]
    fn test_extracted_data_unchanged_reports_false() {
        let mut existing = json!({"a": 1}).as_object().cloned().unwrap();
        let incoming = json!({"a": 1, "b": null}).as_object().cloned().unwrap();
        assert!(!merge_extracted_data(&mut existing, &incoming));
    }

    #[test]
    fn test_provider_caller_name_variants() {
        let camel = json!({"callerName": " Jane Doe "}).as_object().cloned().unwrap();
        let snake = json!({"caller_name": "John Roe"}).as_object().cloned().unwrap();
        let blank = json!({"callerName": ""}).as_object().cloned().unwrap();

        assert_eq!(provider_caller_name(&camel).as_deref(), Some("Jane Doe"));
        assert_eq!(provider_caller_name(&snake).as_deref(), Some("John Roe"));
        assert_eq!(provider_caller_name(&blank), None);
    }
}
