//! Wire payloads and domain types

pub mod extraction;
pub mod payloads;

pub use extraction::{CallerInfo, ExtractionResult, PracticeArea, Urgency, MAX_KEY_FACTS};
pub use payloads::{
    CallEndEvent, CallEnrichment, ClientData, CorrelationKeys, InboundCall, InboundCallPayload,
    PostCallPayload, Provider, TelephonyStatusPayload, ValidationError, EVENT_INBOUND, EVENT_POST_CALL,
};
