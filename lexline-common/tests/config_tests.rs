//! Configuration resolution tests
//!
//! Priority order: CLI → ENV → TOML → compiled defaults.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate LEXLINE_* variables are marked with #[serial].

use lexline_common::config::{
    load_toml_config, ConfigOverrides, ServiceConfig, TomlConfig, DEFAULT_BIND_ADDRESS,
    DEFAULT_SIGNATURE_HEADER, ENV_BIND, ENV_DATABASE, ENV_LLM_API_KEY, ENV_WEBHOOK_SECRET,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn clear_env() {
    for name in [ENV_BIND, ENV_DATABASE, ENV_WEBHOOK_SECRET, ENV_LLM_API_KEY] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    clear_env();

    let config = ServiceConfig::resolve(&ConfigOverrides::default(), None);

    assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    assert_eq!(config.signature_header, DEFAULT_SIGNATURE_HEADER);
    assert_eq!(config.signature_tolerance_secs, 300);
    assert!(config.webhook_secret.is_none());
    assert!(!config.signatures_enforced());
    assert!(config.llm.api_key.is_none());
    assert!(config.diagnostics_enabled);
    assert!(config.database_path.ends_with("lexline.db"));
}

#[test]
#[serial]
fn test_cli_overrides_env_and_toml() {
    clear_env();
    env::set_var(ENV_BIND, "0.0.0.0:9000");

    let toml_config = TomlConfig {
        bind_address: Some("0.0.0.0:8000".to_string()),
        ..Default::default()
    };
    let overrides = ConfigOverrides {
        bind_address: Some("127.0.0.1:7000".to_string()),
        ..Default::default()
    };

    let config = ServiceConfig::resolve(&overrides, Some(&toml_config));
    assert_eq!(config.bind_address, "127.0.0.1:7000");

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var(ENV_WEBHOOK_SECRET, "env-secret");
    env::set_var(ENV_DATABASE, "/tmp/env.db");

    let toml_config = TomlConfig {
        webhook_secret: Some("toml-secret".to_string()),
        database_path: Some(PathBuf::from("/tmp/toml.db")),
        ..Default::default()
    };

    let config = ServiceConfig::resolve(&ConfigOverrides::default(), Some(&toml_config));
    assert_eq!(config.webhook_secret.as_deref(), Some("env-secret"));
    assert_eq!(config.database_path, PathBuf::from("/tmp/env.db"));

    clear_env();
}

#[test]
#[serial]
fn test_blank_secret_counts_as_unset() {
    clear_env();
    env::set_var(ENV_WEBHOOK_SECRET, "   ");

    let toml_config = TomlConfig {
        webhook_secret: Some(String::new()),
        ..Default::default()
    };

    let config = ServiceConfig::resolve(&ConfigOverrides::default(), Some(&toml_config));
    assert!(config.webhook_secret.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_toml_file_round_trip() {
    clear_env();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lexline-hooks.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
bind_address = "0.0.0.0:5790"
webhook_secret = "whsec_file"
signature_header = "X-Provider-Signature"
signature_tolerance_secs = 120
diagnostics_enabled = false

[llm]
api_key = "sk-file"
model = "intake-model"
timeout_secs = 5
"#
    )
    .unwrap();

    let toml_config = load_toml_config(&path).unwrap().expect("file exists");
    let config = ServiceConfig::resolve(&ConfigOverrides::default(), Some(&toml_config));

    assert_eq!(config.bind_address, "0.0.0.0:5790");
    assert_eq!(config.webhook_secret.as_deref(), Some("whsec_file"));
    assert_eq!(config.signature_header, "x-provider-signature");
    assert_eq!(config.signature_tolerance_secs, 120);
    assert!(!config.diagnostics_enabled);
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-file"));
    assert_eq!(config.llm.model, "intake-model");
    assert_eq!(config.llm.timeout_secs, 5);
}

#[test]
fn test_missing_toml_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_toml_config(&dir.path().join("absent.toml"));
    assert!(matches!(result, Ok(None)));
}

#[test]
fn test_invalid_toml_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "bind_address = [unterminated").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(lexline_common::Error::Config(_))));
}
