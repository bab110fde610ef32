//! HTTP API handlers for lexline-hooks

pub mod diagnostics;
pub mod health;
pub mod signature;
pub mod webhooks;

pub use diagnostics::recent_webhook_events;
pub use health::health_routes;
pub use signature::signature_middleware;
pub use webhooks::{inbound_call, post_call, telephony_status};
