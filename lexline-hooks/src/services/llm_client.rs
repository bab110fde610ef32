//! LLM completion client for intake extraction
//!
//! The client only transports text. Turning the model's reply into an
//! [`ExtractionResult`] is [`parse_llm_response`], which is strict: unknown
//! fields, values outside the closed sets, or too many key facts are errors.

use std::time::Duration;

use async_trait::async_trait;
use lexline_common::config::LlmSettings;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{ExtractionResult, PracticeArea, MAX_KEY_FACTS};

const USER_AGENT: &str = concat!("lexline-hooks/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Response had no message content")]
    MissingContent,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),
}

/// Source of raw model output for a transcript
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the model's message content (expected to be JSON)
    async fn complete(&self, transcript: &str, caller_number: Option<&str>) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint
pub struct OpenAiCompletionClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    pub fn new(api_url: String, api_key: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url,
            api_key,
            model,
        })
    }

    /// Build from settings; `None` when no API key is configured
    pub fn from_settings(settings: &LlmSettings) -> Result<Option<Self>, LlmError> {
        let Some(api_key) = settings.api_key.clone() else {
            return Ok(None);
        };
        Self::new(
            settings.api_url.clone(),
            api_key,
            settings.model.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
        .map(Some)
    }

    fn request_body(&self, transcript: &str, caller_number: Option<&str>) -> Value {
        let user_content = match caller_number {
            Some(number) => format!("Caller phone number: {}\n\nTranscript:\n{}", number, transcript),
            None => format!("Transcript:\n{}", transcript),
        };

        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "intake_extraction",
                    "strict": true,
                    "schema": extraction_schema(),
                },
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, transcript: &str, caller_number: Option<&str>) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, transcript_len = transcript.len(), "Requesting LLM extraction");

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(transcript, caller_number))
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(LlmError::Status(status.as_u16(), snippet));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidJson(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::MissingContent)
    }
}

const SYSTEM_PROMPT: &str = "You are a legal intake assistant. Extract the caller's details \
from the phone call transcript. Use only facts the caller stated; use null for anything not \
mentioned. practiceArea must be one of the allowed values. keyFacts holds at most five short \
statements. Respond with JSON only.";

/// JSON schema the model is instructed to fill
pub fn extraction_schema() -> Value {
    let areas: Vec<&str> = PracticeArea::ALL.iter().map(|a| a.label()).collect();
    let nullable_string = json!({ "type": ["string", "null"] });

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "caller", "practiceArea", "incidentDate", "location",
            "summary", "keyFacts", "urgency", "opposingParty"
        ],
        "properties": {
            "caller": {
                "type": "object",
                "additionalProperties": false,
                "required": ["firstName", "lastName", "email", "phone"],
                "properties": {
                    "firstName": nullable_string,
                    "lastName": nullable_string,
                    "email": nullable_string,
                    "phone": nullable_string,
                },
            },
            "practiceArea": { "type": "string", "enum": areas },
            "incidentDate": nullable_string,
            "location": nullable_string,
            "summary": { "type": "string" },
            "keyFacts": {
                "type": "array",
                "items": { "type": "string" },
                "maxItems": MAX_KEY_FACTS,
            },
            "urgency": { "type": "string", "enum": ["low", "medium", "high"] },
            "opposingParty": nullable_string,
        },
    })
}

/// Parse and validate model output
///
/// Tolerates a surrounding markdown code fence; nothing else is repaired.
pub fn parse_llm_response(content: &str) -> Result<ExtractionResult, LlmError> {
    let json = strip_code_fence(content.trim());

    let mut result: ExtractionResult =
        serde_json::from_str(json).map_err(|e| LlmError::InvalidJson(e.to_string()))?;

    if result.key_facts.len() > MAX_KEY_FACTS {
        return Err(LlmError::Schema(format!(
            "{} key facts exceeds limit of {}",
            result.key_facts.len(),
            MAX_KEY_FACTS
        )));
    }
    if result.summary.trim().is_empty() {
        return Err(LlmError::Schema("empty summary".to_string()));
    }

    // Models send "" for unknowns despite the schema; treat as absent
    for field in [
        &mut result.caller.first_name,
        &mut result.caller.last_name,
        &mut result.caller.email,
        &mut result.caller.phone,
        &mut result.incident_date,
        &mut result.location,
        &mut result.opposing_party,
    ] {
        if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
            *field = None;
        }
    }

    if let Some(email) = result.caller.email.as_deref() {
        if !looks_like_email(email) {
            return Err(LlmError::Schema(format!("invalid email {:?}", email)));
        }
    }

    Ok(result)
}

fn strip_code_fence(content: &str) -> &str {
    let Some(inner) = content.strip_prefix("```") else {
        return content;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !value.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
