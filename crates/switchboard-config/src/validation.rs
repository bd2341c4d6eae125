// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks ranges and relationships that serde attributes cannot express.
//! All problems are collected before returning.

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let processor = &config.processor;
    if processor.tick_interval_ms == 0 {
        errors.push(ConfigError::validation(
            "processor.tick_interval_ms must be greater than 0",
        ));
    }
    if processor.max_concurrency == 0 {
        errors.push(ConfigError::validation(
            "processor.max_concurrency must be at least 1",
        ));
    }
    for (name, value) in [
        ("processor.generation_timeout_ms", processor.generation_timeout_ms),
        ("processor.delivery_timeout_ms", processor.delivery_timeout_ms),
        ("processor.store_timeout_ms", processor.store_timeout_ms),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{name} must be greater than 0"
            )));
        }
    }

    let generation = &config.generation;
    if generation.history_limit == 0 {
        errors.push(ConfigError::validation(
            "generation.history_limit must be at least 1",
        ));
    }
    if generation.fallback_response.trim().is_empty() {
        errors.push(ConfigError::validation(
            "generation.fallback_response must not be empty",
        ));
    }
    // Fallback replies must land in the low-confidence band so they always escalate.
    if !(0.1..=0.3).contains(&generation.fallback_confidence) {
        errors.push(ConfigError::validation(format!(
            "generation.fallback_confidence must be within [0.1, 0.3], got {}",
            generation.fallback_confidence
        )));
    }

    let heuristics = &config.heuristics;
    for (name, value) in [
        ("heuristics.base_confidence", heuristics.base_confidence),
        ("heuristics.short_response_penalty", heuristics.short_response_penalty),
        ("heuristics.hedge_penalty", heuristics.hedge_penalty),
        ("heuristics.action_bonus", heuristics.action_bonus),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::validation(format!(
                "{name} must be within [0.0, 1.0], got {value}"
            )));
        }
    }

    let escalation = &config.escalation;
    for (name, value) in [
        ("escalation.confidence_threshold", escalation.confidence_threshold),
        (
            "escalation.sentiment_confidence_threshold",
            escalation.sentiment_confidence_threshold,
        ),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::validation(format!(
                "{name} must be within [0.0, 1.0], got {value}"
            )));
        }
    }
    if let Some(i) = escalation.keywords.iter().position(|k| k.trim().is_empty()) {
        errors.push(ConfigError::validation(format!(
            "escalation.keywords[{i}] must not be empty"
        )));
    }

    let metrics = &config.metrics;
    if metrics.retention_hours == 0 {
        errors.push(ConfigError::validation(
            "metrics.retention_hours must be at least 1",
        ));
    }
    let retention_minutes = metrics.retention_hours.saturating_mul(60);
    for (name, window) in [
        ("metrics.report_window_minutes", metrics.report_window_minutes),
        ("metrics.live_window_minutes", metrics.live_window_minutes),
    ] {
        if window == 0 || window > retention_minutes {
            errors.push(ConfigError::validation(format!(
                "{name} must be between 1 and metrics.retention_hours * 60 ({retention_minutes}), got {window}"
            )));
        }
    }
    if metrics.prune_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "metrics.prune_interval_secs must be greater than 0",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
