//! Webhook signature middleware
//!
//! Verifies the HMAC signature over the exact request bytes, then hands the
//! same bytes on to the handler. With no secret configured every request is
//! let through and the bypass is logged.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use lexline_common::api::verify_signature;

use crate::error::ApiError;
use crate::AppState;

/// Largest webhook body accepted
pub const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

pub async fn signature_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    let Some(secret) = state.config.webhook_secret.as_deref() else {
        tracing::warn!(path = %path, "Webhook signature check bypassed: no secret configured (open mode)");
        return Ok(next.run(request).await);
    };

    let header = request
        .headers()
        .get(state.config.signature_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let Some(header) = header else {
        tracing::warn!(path = %path, header = %state.config.signature_header, "Webhook rejected: signature header missing");
        return Err(ApiError::Forbidden("missing signature header".to_string()));
    };

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {}", e)))?;

    if let Err(e) = verify_signature(
        &body_bytes,
        &header,
        secret,
        state.config.signature_tolerance_secs,
    ) {
        tracing::warn!(path = %path, body_len = body_bytes.len(), error = %e, "Webhook rejected: signature verification failed");
        return Err(ApiError::Forbidden(e.to_string()));
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}
