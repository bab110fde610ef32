//! Webhook endpoints
//!
//! Handlers take the raw body so the ledger stores exactly what was
//! delivered. Duplicate and unlinked events are successful responses: an
//! error status would only make the provider retry an event whose outcome
//! cannot change.

use axum::{body::Bytes, extract::State, Json};
use lexline_common::phone::mask_phone;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{InboundCallPayload, PostCallPayload, TelephonyStatusPayload, ValidationError};
use crate::services::{CallEndOutcome, CallRefs, InboundOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<Uuid>,
}

impl InboundResponse {
    fn new(status: &'static str, refs: Option<CallRefs>) -> Self {
        Self {
            status,
            call_id: refs.map(|r| r.call_id),
            lead_id: refs.map(|r| r.lead_id),
            interaction_id: refs.map(|r| r.interaction_id),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_method: Option<&'static str>,
}

impl From<CallEndOutcome> for CallEndResponse {
    fn from(outcome: CallEndOutcome) -> Self {
        match outcome {
            CallEndOutcome::Linked { refs, method } => Self {
                status: "ok",
                call_id: Some(refs.call_id),
                lead_id: Some(refs.lead_id),
                correlation_method: Some(method.as_str()),
            },
            CallEndOutcome::Unlinked => Self {
                status: "unlinked",
                call_id: None,
                lead_id: None,
                correlation_method: None,
            },
            CallEndOutcome::Duplicate(refs) => Self {
                status: "duplicate",
                call_id: refs.map(|r| r.call_id),
                lead_id: refs.map(|r| r.lead_id),
                correlation_method: None,
            },
        }
    }
}

fn parse_body<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::info!(endpoint, error = %e, "Rejected webhook: invalid JSON");
        ApiError::BadRequest(format!("Invalid JSON body: {}", e))
    })
}

fn rejected(endpoint: &str, err: ValidationError) -> ApiError {
    tracing::info!(endpoint, error = %err, "Rejected webhook: validation failed");
    err.into()
}

/// POST /webhooks/voice/inbound
pub async fn inbound_call(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<InboundResponse>> {
    const ENDPOINT: &str = "voice/inbound";

    let payload: InboundCallPayload = parse_body(ENDPOINT, &body)?;
    let call = payload.validate().map_err(|e| rejected(ENDPOINT, e))?;
    let raw = String::from_utf8_lossy(&body);

    match state.pipeline.handle_inbound(&call, &raw).await? {
        InboundOutcome::Created(refs) => Ok(Json(InboundResponse::new("created", Some(refs)))),
        InboundOutcome::Duplicate(refs) => Ok(Json(InboundResponse::new("duplicate", refs))),
        InboundOutcome::TenantNotFound => Err(ApiError::NotFound(format!(
            "No tenant for dialed number {}",
            mask_phone(&call.called_e164)
        ))),
    }
}

/// POST /webhooks/voice/post-call
pub async fn post_call(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<CallEndResponse>> {
    const ENDPOINT: &str = "voice/post-call";

    let payload: PostCallPayload = parse_body(ENDPOINT, &body)?;
    let event = payload.validate().map_err(|e| rejected(ENDPOINT, e))?;
    let raw = String::from_utf8_lossy(&body);

    let outcome = state.pipeline.handle_call_end(&event, &raw).await?;
    Ok(Json(outcome.into()))
}

/// POST /webhooks/telephony/status
pub async fn telephony_status(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<CallEndResponse>> {
    const ENDPOINT: &str = "telephony/status";

    let payload: TelephonyStatusPayload = parse_body(ENDPOINT, &body)?;
    let event = payload.validate().map_err(|e| rejected(ENDPOINT, e))?;
    let raw = String::from_utf8_lossy(&body);

    let outcome = state.pipeline.handle_call_end(&event, &raw).await?;
    Ok(Json(outcome.into()))
}
