//! Pipeline components
//!
//! Each component takes its store connection or client explicitly, so it can
//! be exercised alone against an in-memory database or a canned LLM.

pub mod correlation_matcher;
pub mod enrichment_merger;
pub mod identity_upsert;
pub mod intake_extractor;
pub mod lexicon;
pub mod llm_client;
pub mod qualification_scorer;
pub mod rule_extractor;
pub mod tenant_resolver;
pub mod webhook_pipeline;

pub use intake_extractor::IntakeExtractor;
pub use webhook_pipeline::{CallEndOutcome, CallRefs, InboundOutcome, WebhookPipeline};
