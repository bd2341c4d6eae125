// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use switchboard_config::diagnostic::ConfigError;
use switchboard_config::model::SwitchboardConfig;
use switchboard_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config should load");
    assert_eq!(config.processor.tick_interval_ms, 500);
    assert_eq!(config.processor.max_concurrency, 3);
    assert_eq!(config.processor.generation_timeout_ms, 5000);
    assert_eq!(config.generation.history_limit, 10);
    assert_eq!(config.generation.default_language, "en");
    assert_eq!(config.escalation.confidence_threshold, 0.6);
    assert_eq!(config.escalation.sentiment_confidence_threshold, 0.8);
    assert!(config.escalation.keywords.iter().any(|k| k == "refund"));
    assert_eq!(config.metrics.retention_hours, 48);
    assert_eq!(config.metrics.report_window_minutes, 1440);
}

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
name = "support-east"
log_level = "debug"

[processor]
tick_interval_ms = 250
max_concurrency = 8
generation_timeout_ms = 3000

[generation]
history_limit = 5
default_language = "es"
fallback_confidence = 0.15

[escalation]
confidence_threshold = 0.7
keywords = ["supervisor", "chargeback"]

[storage]
database_path = "/tmp/switchboard-test.db"
wal_mode = false

[anthropic]
api_key = "sk-ant-test"

[gateway]
enabled = false
port = 9000
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "support-east");
    assert_eq!(config.processor.tick_interval_ms, 250);
    assert_eq!(config.processor.max_concurrency, 8);
    assert_eq!(config.generation.history_limit, 5);
    assert_eq!(config.generation.default_language, "es");
    assert_eq!(config.generation.fallback_confidence, 0.15);
    assert_eq!(config.escalation.keywords, vec!["supervisor", "chargeback"]);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.anthropic.api_key.as_deref(), Some("sk-ant-test"));
    assert!(!config.gateway.enabled);
    assert_eq!(config.gateway.port, 9000);
    // Unspecified keys in a present section keep their defaults.
    assert_eq!(config.escalation.sentiment_confidence_threshold, 0.8);
}

#[test]
fn unknown_key_reports_suggestion() {
    let toml = r#"
[processor]
max_concurency = 4
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_concurency");
            assert_eq!(suggestion.as_deref(), Some("max_concurrency"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[scheduler]\ntick = 1\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_reports_invalid_type() {
    let toml = r#"
[processor]
max_concurrency = "three"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert!(key.contains("max_concurrency")),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn semantic_errors_surface_through_loader() {
    let toml = r#"
[processor]
max_concurrency = 0

[escalation]
confidence_threshold = 2.0
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[processor]
max_concurrency = 2
"#,
        )?;
        jail.set_env("SWITCHBOARD_PROCESSOR_MAX_CONCURRENCY", "6");
        jail.set_env("SWITCHBOARD_ESCALATION_CONFIDENCE_THRESHOLD", "0.5");

        let path = jail.directory().join("custom.toml");
        let config = load_and_validate_path(&path).expect("valid config");
        assert_eq!(config.processor.max_concurrency, 6);
        assert_eq!(config.escalation.confidence_threshold, 0.5);
        Ok(())
    });
}

#[test]
fn effective_config_round_trips_through_toml() {
    let config = SwitchboardConfig::default();
    let rendered = config.to_toml_string().expect("render");
    let reloaded = load_config_from_str(&rendered).expect("reload");
    assert_eq!(
        reloaded.processor.max_concurrency,
        config.processor.max_concurrency
    );
    assert_eq!(reloaded.escalation.keywords, config.escalation.keywords);
}
