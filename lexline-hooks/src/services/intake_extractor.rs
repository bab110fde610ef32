//! Intake extraction with optional LLM assistance
//!
//! The LLM path is used only when a client is configured. Any failure on
//! that path falls back to the rule-based extractor, so `extract` cannot fail.

use std::sync::Arc;

use lexline_common::config::LlmSettings;

use crate::models::ExtractionResult;
use crate::services::llm_client::{parse_llm_response, CompletionClient, LlmError, OpenAiCompletionClient};
use crate::services::rule_extractor;

/// Which backend produced an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Llm,
    Rules,
    /// LLM configured but failed
    RulesFallback,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionSource::Llm => "llm",
            ExtractionSource::Rules => "rules",
            ExtractionSource::RulesFallback => "rules_fallback",
        }
    }
}

#[derive(Clone)]
pub struct IntakeExtractor {
    llm: Option<Arc<dyn CompletionClient>>,
}

impl IntakeExtractor {
    pub fn rule_based() -> Self {
        Self { llm: None }
    }

    pub fn with_llm(client: Arc<dyn CompletionClient>) -> Self {
        Self { llm: Some(client) }
    }

    /// LLM-assisted when an API key is configured, rule-based otherwise
    pub fn from_settings(settings: &LlmSettings) -> Self {
        match OpenAiCompletionClient::from_settings(settings) {
            Ok(Some(client)) => {
                tracing::info!(model = %settings.model, "LLM-assisted intake extraction enabled");
                Self::with_llm(Arc::new(client))
            }
            Ok(None) => {
                tracing::info!("No LLM API key configured; using rule-based intake extraction");
                Self::rule_based()
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM client setup failed; using rule-based intake extraction");
                Self::rule_based()
            }
        }
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn extract(&self, transcript: &str, caller_number: Option<&str>) -> ExtractionResult {
        self.extract_with_source(transcript, caller_number).await.0
    }

    pub async fn extract_with_source(
        &self,
        transcript: &str,
        caller_number: Option<&str>,
    ) -> (ExtractionResult, ExtractionSource) {
        let Some(llm) = &self.llm else {
            return (rule_extractor::extract(transcript, caller_number), ExtractionSource::Rules);
        };

        match Self::extract_via_llm(llm.as_ref(), transcript, caller_number).await {
            Ok(mut result) => {
                if result.caller.phone.is_none() {
                    result.caller.phone =
                        caller_number.and_then(lexline_common::phone::normalize_phone);
                }
                (result, ExtractionSource::Llm)
            }
            Err(e) => {
                tracing::warn!(error = %e, "LLM extraction failed; falling back to rule-based extraction");
                (
                    rule_extractor::extract(transcript, caller_number),
                    ExtractionSource::RulesFallback,
                )
            }
        }
    }

    async fn extract_via_llm(
        llm: &dyn CompletionClient,
        transcript: &str,
        caller_number: Option<&str>,
    ) -> Result<ExtractionResult, LlmError> {
        let content = llm.complete(transcript, caller_number).await?;
        parse_llm_response(&content)
    }
}

impl std::fmt::Debug for IntakeExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeExtractor")
            .field("llm_enabled", &self.llm_enabled())
            .finish()
    }
}
