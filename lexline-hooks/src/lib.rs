//! lexline-hooks library - telephony webhook ingestion
//!
//! Receives call-start and call-end webhooks from the voice-AI and telephony
//! providers, deduplicates them, stitches both halves of a call together and
//! enriches the caller's lead.

use std::sync::Arc;

use axum::Router;
use lexline_common::config::ServiceConfig;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ApiError, ApiResult};

use services::{IntakeExtractor, WebhookPipeline};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ServiceConfig>,
    pub pipeline: WebhookPipeline,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig, extractor: IntakeExtractor) -> Self {
        let pipeline = WebhookPipeline::new(db.clone(), extractor);
        Self {
            db,
            config: Arc::new(config),
            pipeline,
        }
    }
}

/// Build application router
///
/// Webhook routes sit behind signature verification; health and
/// diagnostics do not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let webhooks = Router::new()
        .route("/webhooks/voice/inbound", post(api::inbound_call))
        .route("/webhooks/voice/post-call", post(api::post_call))
        .route("/webhooks/telephony/status", post(api::telephony_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::signature_middleware,
        ));

    let public = Router::new()
        .route("/api/diagnostics/webhooks", get(api::recent_webhook_events))
        .merge(api::health_routes());

    Router::new()
        .merge(webhooks)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
