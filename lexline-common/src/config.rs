//! Configuration loading
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never fatal: the service logs a warning and runs
//! on defaults. A TOML file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable names
pub const ENV_CONFIG: &str = "LEXLINE_CONFIG";
pub const ENV_BIND: &str = "LEXLINE_BIND";
pub const ENV_DATABASE: &str = "LEXLINE_DATABASE";
pub const ENV_WEBHOOK_SECRET: &str = "LEXLINE_WEBHOOK_SECRET";
pub const ENV_LLM_API_KEY: &str = "LEXLINE_LLM_API_KEY";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 20;

/// On-disk TOML configuration; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
    pub webhook_secret: Option<String>,
    pub signature_header: Option<String>,
    pub signature_tolerance_secs: Option<i64>,
    pub diagnostics_enabled: Option<bool>,
    #[serde(default)]
    pub llm: LlmToml,
}

/// `[llm]` table of the TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmToml {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub database_path: Option<PathBuf>,
    pub webhook_secret: Option<String>,
    pub llm_api_key: Option<String>,
}

/// LLM extraction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    /// Absent key disables the LLM path entirely
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_LLM_API_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub database_path: PathBuf,
    /// Absent secret means signature verification is bypassed (open mode)
    pub webhook_secret: Option<String>,
    pub signature_header: String,
    pub signature_tolerance_secs: i64,
    pub diagnostics_enabled: bool,
    pub llm: LlmSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            database_path: default_database_path(),
            webhook_secret: None,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            signature_tolerance_secs: crate::api::DEFAULT_TOLERANCE_SECS,
            diagnostics_enabled: true,
            llm: LlmSettings::default(),
        }
    }
}

impl ServiceConfig {
    /// Resolve configuration from CLI overrides, environment, and TOML
    pub fn resolve(overrides: &ConfigOverrides, toml_config: Option<&TomlConfig>) -> Self {
        let defaults = Self::default();
        let toml_config = toml_config.cloned().unwrap_or_default();

        let bind_address = overrides
            .bind_address
            .clone()
            .or_else(|| env_value(ENV_BIND))
            .or(toml_config.bind_address)
            .unwrap_or(defaults.bind_address);

        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| env_value(ENV_DATABASE).map(PathBuf::from))
            .or(toml_config.database_path)
            .unwrap_or(defaults.database_path);

        let webhook_secret = non_blank(overrides.webhook_secret.clone())
            .or_else(|| env_value(ENV_WEBHOOK_SECRET))
            .or_else(|| non_blank(toml_config.webhook_secret));

        let llm_api_key = non_blank(overrides.llm_api_key.clone())
            .or_else(|| env_value(ENV_LLM_API_KEY))
            .or_else(|| non_blank(toml_config.llm.api_key));

        Self {
            bind_address,
            database_path,
            webhook_secret,
            signature_header: toml_config
                .signature_header
                .map(|h| h.to_ascii_lowercase())
                .unwrap_or(defaults.signature_header),
            signature_tolerance_secs: toml_config
                .signature_tolerance_secs
                .unwrap_or(defaults.signature_tolerance_secs),
            diagnostics_enabled: toml_config
                .diagnostics_enabled
                .unwrap_or(defaults.diagnostics_enabled),
            llm: LlmSettings {
                api_key: llm_api_key,
                api_url: toml_config.llm.api_url.unwrap_or(defaults.llm.api_url),
                model: toml_config.llm.model.unwrap_or(defaults.llm.model),
                timeout_secs: toml_config
                    .llm
                    .timeout_secs
                    .unwrap_or(defaults.llm.timeout_secs),
            },
        }
    }

    /// Whether webhook signatures are checked
    pub fn signatures_enforced(&self) -> bool {
        self.webhook_secret.is_some()
    }
}

/// Locate the TOML file: explicit path, then `LEXLINE_CONFIG`, then the
/// per-user config directory
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_value(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("lexline").join("lexline-hooks.toml"))
}

/// Load a TOML config file
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (using environment and defaults)",
            path.display()
        );
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(Some(config))
}

/// Get OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lexline"))
        .unwrap_or_else(|| PathBuf::from("./lexline_data"))
        .join("lexline.db")
}

fn env_value(name: &str) -> Option<String> {
    non_blank(std::env::var(name).ok())
}

/// Empty or whitespace-only values count as unset
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
