// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock language model for deterministic testing.
//!
//! `MockModel` implements `LanguageModel` with a scripted reply queue,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::{
    AdapterType, GenerationOptions, GenerationResponse, HealthStatus, HistoryTurn, LanguageModel,
    PluginAdapter, SwitchboardError,
};

/// Reply returned when the script is empty. Long and actionable, so it scores
/// above the default escalation threshold.
pub const DEFAULT_REPLY: &str =
    "Thanks for reaching out! You can track your order from the orders page in your account.";

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(GenerationResponse),
    Fail(String),
    /// Never returns; exercises the generation deadline.
    Hang,
}

/// A recorded `generate` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub prompt: String,
    pub history: Vec<HistoryTurn>,
    pub options: GenerationOptions,
}

/// A mock language model that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty,
/// [`DEFAULT_REPLY`] is returned.
pub struct MockModel {
    script: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<MockCall>>,
    latency: Mutex<Duration>,
}

impl MockModel {
    /// Create a new mock model with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Create a mock model pre-loaded with plain-text replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let script = responses
            .into_iter()
            .map(|text| MockReply::Text(GenerationResponse::text(text)))
            .collect();
        Self {
            script: Mutex::new(script),
            ..Self::new()
        }
    }

    pub async fn push_text(&self, text: impl Into<String>) {
        self.push(MockReply::Text(GenerationResponse::text(text))).await;
    }

    pub async fn push_response(&self, response: GenerationResponse) {
        self.push(MockReply::Text(response)).await;
    }

    pub async fn push_error(&self, message: impl Into<String>) {
        self.push(MockReply::Fail(message.into())).await;
    }

    pub async fn push_hang(&self) {
        self.push(MockReply::Hang).await;
    }

    pub async fn push(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    /// Delay every call by `latency` before replying.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = latency;
    }

    /// Number of `generate` calls so far.
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Every `generate` call so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockModel {
    fn name(&self) -> &str {
        "mock-model"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::LanguageModel
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, SwitchboardError> {
        self.calls.lock().await.push(MockCall {
            prompt: prompt.to_string(),
            history: history.to_vec(),
            options: options.clone(),
        });

        let latency = *self.latency.lock().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let reply = self.script.lock().await.pop_front();
        match reply {
            Some(MockReply::Text(response)) => Ok(response),
            Some(MockReply::Fail(message)) => Err(SwitchboardError::Provider {
                message,
                source: None,
            }),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Ok(GenerationResponse::text(DEFAULT_REPLY)),
        }
    }
}

#[cfg(test)]
mod tests {
    use switchboard_core::ChannelType;

    use super::*;

    fn options() -> GenerationOptions {
        GenerationOptions {
            channel_type: ChannelType::Widget,
            language: "en".into(),
            system_prompt: None,
            max_tokens: 512,
            time_budget: None,
        }
    }

    #[tokio::test]
    async fn replies_in_order_then_default() {
        let model = MockModel::with_responses(vec!["first".into(), "second".into()]);

        let a = model.generate("q", &[], &options()).await.unwrap();
        let b = model.generate("q", &[], &options()).await.unwrap();
        let c = model.generate("q", &[], &options()).await.unwrap();

        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert_eq!(c.text, DEFAULT_REPLY);
        assert_eq!(model.call_count().await, 3);
    }

    #[tokio::test]
    async fn scripted_error_is_a_provider_error() {
        let model = MockModel::new();
        model.push_error("upstream 503").await;

        let err = model.generate("q", &[], &options()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("upstream 503"));
    }

    #[tokio::test]
    async fn records_prompt_and_history() {
        let model = MockModel::new();
        let history = vec![HistoryTurn {
            sender: switchboard_core::Sender::Customer,
            content: "earlier".into(),
        }];

        model.generate("latest", &history, &options()).await.unwrap();

        let calls = model.calls().await;
        assert_eq!(calls[0].prompt, "latest");
        assert_eq!(calls[0].history, history);
        assert_eq!(calls[0].options.max_tokens, 512);
    }
}
