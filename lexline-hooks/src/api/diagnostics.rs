//! Read-only webhook diagnostics
//!
//! Recent ledger entries joined with the Call each one resolved to. Phone
//! numbers are masked to their last four digits.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use lexline_common::phone::mask_phone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::ledger::{self, LedgerDiagnostic};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct DiagnosticsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub count: usize,
    pub entries: Vec<DiagnosticEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    pub id: i64,
    pub provider: String,
    pub external_id: String,
    pub event_type: String,
    pub received_at: DateTime<Utc>,
    /// `None` for unlinked events
    pub correlation_method: Option<String>,
    pub call: Option<DiagnosticCall>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticCall {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub interaction_id: Uuid,
    #[serde(rename = "elevenLabsId")]
    pub elevenlabs_id: Option<String>,
    pub twilio_call_sid: Option<String>,
    pub caller_number: String,
    pub called_number: String,
    pub call_outcome: Option<String>,
    pub duration_seconds: Option<i64>,
}

impl From<LedgerDiagnostic> for DiagnosticEntry {
    fn from(diag: LedgerDiagnostic) -> Self {
        let LedgerDiagnostic { entry, call } = diag;
        Self {
            id: entry.id,
            provider: entry.provider,
            external_id: entry.external_id,
            event_type: entry.event_type,
            received_at: entry.received_at,
            correlation_method: entry.correlation_method,
            call: call.map(|call| DiagnosticCall {
                id: call.id,
                lead_id: call.lead_id,
                interaction_id: call.interaction_id,
                elevenlabs_id: call.elevenlabs_id,
                twilio_call_sid: call.twilio_call_sid,
                caller_number: mask_phone(&call.caller_number),
                called_number: mask_phone(&call.called_number),
                call_outcome: call.call_outcome,
                duration_seconds: call.duration_seconds,
            }),
        }
    }
}

/// GET /api/diagnostics/webhooks?limit=N
pub async fn recent_webhook_events(
    State(state): State<AppState>,
    Query(query): Query<DiagnosticsQuery>,
) -> ApiResult<Json<DiagnosticsResponse>> {
    if !state.config.diagnostics_enabled {
        return Err(ApiError::NotFound("Diagnostics are disabled".to_string()));
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut conn = state.db.acquire().await?;
    let entries: Vec<DiagnosticEntry> = ledger::recent_with_calls(&mut conn, limit)
        .await?
        .into_iter()
        .map(DiagnosticEntry::from)
        .collect();

    Ok(Json(DiagnosticsResponse {
        count: entries.len(),
        entries,
    }))
}
