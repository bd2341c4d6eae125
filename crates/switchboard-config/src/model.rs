// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard reply engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Job processor (scheduler and worker pool) settings.
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Generation pipeline settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Heuristic confidence/intent/sentiment derivation.
    #[serde(default)]
    pub heuristics: HeuristicsConfig,

    /// Escalation policy thresholds and keywords.
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// In-memory performance metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl SwitchboardConfig {
    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "switchboard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Job processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Interval between job store polls, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum number of jobs processed at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Hard deadline for one generation, in milliseconds.
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// Deadline for handing one reply to its channel adapter, in milliseconds.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// Deadline for each job store or conversation store write, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// How long shutdown waits for in-flight jobs, in seconds.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_concurrency: default_max_concurrency(),
            generation_timeout_ms: default_generation_timeout_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    500
}

fn default_max_concurrency() -> usize {
    3
}

fn default_generation_timeout_ms() -> u64 {
    5000
}

fn default_delivery_timeout_ms() -> u64 {
    3000
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_drain_timeout_secs() -> u64 {
    10
}

/// Generation pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Number of prior messages included as history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Language assumed when the job context does not name one.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Maximum tokens requested from the language model.
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,

    /// Optional system prompt prepended to every request.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Reply sent when generation fails or misses the deadline.
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,

    /// Confidence reported for the fallback reply.
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            default_language: default_language(),
            max_tokens: default_generation_max_tokens(),
            system_prompt: None,
            fallback_response: default_fallback_response(),
            fallback_confidence: default_fallback_confidence(),
        }
    }
}

fn default_history_limit() -> usize {
    10
}

fn default_language() -> String {
    "en".to_string()
}

fn default_generation_max_tokens() -> u32 {
    512
}

fn default_fallback_response() -> String {
    "Thanks for your message. We're sorry for the wait; a member of our team will get back to you shortly."
        .to_string()
}

fn default_fallback_confidence() -> f64 {
    0.2
}

/// Heuristics used when the language model does not report its own signals.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeuristicsConfig {
    /// Starting confidence before adjustments.
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    /// Replies shorter than this many characters are penalised.
    #[serde(default = "default_short_response_chars")]
    pub short_response_chars: usize,

    /// Penalty applied to short replies.
    #[serde(default = "default_short_response_penalty")]
    pub short_response_penalty: f64,

    /// Penalty applied when the reply hedges.
    #[serde(default = "default_hedge_penalty")]
    pub hedge_penalty: f64,

    /// Bonus applied when the reply proposes a concrete action.
    #[serde(default = "default_action_bonus")]
    pub action_bonus: f64,

    /// Phrases that signal an unsure reply.
    #[serde(default = "default_hedging_phrases")]
    pub hedging_phrases: Vec<String>,

    /// Phrases that signal an actionable reply.
    #[serde(default = "default_action_phrases")]
    pub action_phrases: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            base_confidence: default_base_confidence(),
            short_response_chars: default_short_response_chars(),
            short_response_penalty: default_short_response_penalty(),
            hedge_penalty: default_hedge_penalty(),
            action_bonus: default_action_bonus(),
            hedging_phrases: default_hedging_phrases(),
            action_phrases: default_action_phrases(),
        }
    }
}

fn default_base_confidence() -> f64 {
    0.8
}

fn default_short_response_chars() -> usize {
    20
}

fn default_short_response_penalty() -> f64 {
    0.2
}

fn default_hedge_penalty() -> f64 {
    0.25
}

fn default_action_bonus() -> f64 {
    0.1
}

fn default_hedging_phrases() -> Vec<String> {
    [
        "i don't know",
        "i do not know",
        "i'm not sure",
        "i am not sure",
        "not certain",
        "i can't help",
        "i cannot help",
        "unable to help",
        "maybe",
        "perhaps",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_action_phrases() -> Vec<String> {
    [
        "you can",
        "here's how",
        "here is how",
        "i've updated",
        "i have updated",
        "i've sent",
        "follow these steps",
        "click",
        "your order",
        "tracking number",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Escalation policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    /// Replies below this confidence always go to a human.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Negative-sentiment messages escalate below this confidence.
    #[serde(default = "default_sentiment_confidence_threshold")]
    pub sentiment_confidence_threshold: f64,

    /// Customer words that always escalate.
    #[serde(default = "default_escalation_keywords")]
    pub keywords: Vec<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            sentiment_confidence_threshold: default_sentiment_confidence_threshold(),
            keywords: default_escalation_keywords(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_sentiment_confidence_threshold() -> f64 {
    0.8
}

fn default_escalation_keywords() -> Vec<String> {
    [
        "human",
        "agent",
        "manager",
        "supervisor",
        "refund",
        "cancel",
        "legal",
        "lawyer",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// In-memory performance metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Samples older than this are purged.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Interval between purge sweeps, in seconds.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,

    /// Window used by reporting views, in minutes.
    #[serde(default = "default_report_window_minutes")]
    pub report_window_minutes: u64,

    /// Window used by the live view, in minutes.
    #[serde(default = "default_live_window_minutes")]
    pub live_window_minutes: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            prune_interval_secs: default_prune_interval_secs(),
            report_window_minutes: default_report_window_minutes(),
            live_window_minutes: default_live_window_minutes(),
        }
    }
}

fn default_retention_hours() -> u64 {
    48
}

fn default_prune_interval_secs() -> u64 {
    300
}

fn default_report_window_minutes() -> u64 {
    24 * 60
}

fn default_live_window_minutes() -> u64 {
    60
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("switchboard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchboard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for reply generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP gateway.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3080
}
