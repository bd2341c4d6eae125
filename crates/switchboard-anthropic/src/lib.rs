// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude language model adapter for Switchboard.
//!
//! Implements [`LanguageModel`] over the non-streaming Messages API. Prior
//! conversation turns become alternating user/assistant messages and the
//! inbound customer text is the final user turn.

pub mod client;
pub mod types;

use async_trait::async_trait;
use switchboard_config::model::AnthropicConfig;
use switchboard_core::{
    AdapterType, GenerationOptions, GenerationResponse, HealthStatus, HistoryTurn, LanguageModel,
    PluginAdapter, Sender, SwitchboardError,
};
use tracing::debug;

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest, Role};

/// Language model backed by the Anthropic Messages API.
pub struct AnthropicModel {
    client: AnthropicClient,
}

impl AnthropicModel {
    /// Creates a model adapter from configuration.
    ///
    /// The API key is resolved from config, then the `ANTHROPIC_API_KEY`
    /// environment variable.
    pub fn new(config: &AnthropicConfig) -> Result<Self, SwitchboardError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = AnthropicClient::new(&api_key, &config.api_version, config.model.as_str())?;
        Ok(Self { client })
    }

    #[cfg(test)]
    fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    fn to_message_request(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        options: &GenerationOptions,
    ) -> MessageRequest {
        MessageRequest {
            model: self.client.model().to_string(),
            messages: to_api_messages(prompt, history),
            system: options.system_prompt.clone(),
            max_tokens: options.max_tokens,
            stream: false,
        }
    }
}

/// Folds history into the alternating turn sequence the API accepts.
///
/// Customer turns map to `user`, AI and agent turns to `assistant`.
/// Consecutive turns from the same side are joined, leading assistant
/// turns are dropped, and `prompt` closes the sequence as a user turn.
fn to_api_messages(prompt: &str, history: &[HistoryTurn]) -> Vec<ApiMessage> {
    let mut messages: Vec<ApiMessage> = Vec::with_capacity(history.len() + 1);
    let turns = history
        .iter()
        .map(|turn| (role_for(turn.sender), turn.content.as_str()))
        .chain(std::iter::once((Role::User, prompt)));

    for (role, content) in turns {
        if content.trim().is_empty() {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(content);
            }
            None if role == Role::Assistant => {}
            _ => messages.push(ApiMessage::new(role, content)),
        }
    }
    messages
}

fn role_for(sender: Sender) -> Role {
    match sender {
        Sender::Customer => Role::User,
        Sender::Ai | Sender::Agent => Role::Assistant,
    }
}

#[async_trait]
impl PluginAdapter for AnthropicModel {
    fn name(&self) -> &str {
        "anthropic"
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
impl LanguageModel for AnthropicModel {
    async fn generate(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, SwitchboardError> {
        let request = self.to_message_request(prompt, history, options);
        let response = self
            .client
            .complete_message(&request, options.time_budget)
            .await?;
        debug!(
            id = %response.id,
            model = %response.model,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "reply generated"
        );

        let text = response.text();
        if text.trim().is_empty() {
            return Err(SwitchboardError::Provider {
                message: "model returned no text".into(),
                source: None,
            });
        }
        Ok(GenerationResponse::text(text))
    }
}

/// Resolves the API key: config first, then the environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, SwitchboardError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        SwitchboardError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::ChannelType;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn turn(sender: Sender, content: &str) -> HistoryTurn {
        HistoryTurn {
            sender,
            content: content.into(),
        }
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            channel_type: ChannelType::Email,
            language: "en".into(),
            system_prompt: Some("You are a support agent.".into()),
            max_tokens: 300,
            time_budget: None,
        }
    }

    #[test]
    fn resolve_api_key_from_config() {
        let result = resolve_api_key(&Some("sk-test-123".into()));
        assert_eq!(result.unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_none_falls_back_to_env() {
        let result = resolve_api_key(&None);
        // Will succeed if env is set, fail otherwise.
        if let Err(err) = result {
            assert!(err.to_string().contains("API key not found"), "got: {err}");
        }
    }

    #[test]
    fn prompt_alone_is_a_single_user_turn() {
        let messages = to_api_messages("Where is my parcel?", &[]);
        assert_eq!(messages, vec![ApiMessage::user("Where is my parcel?")]);
    }

    #[test]
    fn history_alternates_and_merges_same_side_turns() {
        let history = vec![
            turn(Sender::Ai, "Welcome! How can I help?"),
            turn(Sender::Customer, "Hi"),
            turn(Sender::Customer, "My order is late"),
            turn(Sender::Ai, "Sorry to hear that."),
            turn(Sender::Agent, "I'm looking into it."),
            turn(Sender::Customer, "Thanks"),
        ];
        let messages = to_api_messages("Any update?", &history);

        assert_eq!(
            messages,
            vec![
                ApiMessage::user("Hi\n\nMy order is late"),
                ApiMessage::assistant("Sorry to hear that.\n\nI'm looking into it."),
                ApiMessage::user("Thanks\n\nAny update?"),
            ]
        );
    }

    #[test]
    fn request_carries_system_prompt_and_token_limit() {
        let client = AnthropicClient::new("k", "2023-06-01", "claude-3-5-haiku-20241022")
            .unwrap();
        let model = AnthropicModel::with_client(client);
        let request = model.to_message_request("hello", &[], &options());

        assert_eq!(request.model, "claude-3-5-haiku-20241022");
        assert_eq!(request.system.as_deref(), Some("You are a support agent."));
        assert_eq!(request.max_tokens, 300);
        assert!(!request.stream);
    }

    #[tokio::test]
    async fn generate_returns_reply_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "system": "You are a support agent.",
                "messages": [{"role": "user", "content": "Where is my order?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "content": [{"type": "text", "text": "It ships tomorrow."}],
                "model": "claude-3-5-haiku-20241022",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 20, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let client = AnthropicClient::new("k", "2023-06-01", "claude-3-5-haiku-20241022")
            .unwrap()
            .with_endpoint(server.uri());
        let model = AnthropicModel::with_client(client);

        let reply = model
            .generate("Where is my order?", &[], &options())
            .await
            .unwrap();
        assert_eq!(reply.text, "It ships tomorrow.");
        assert!(reply.confidence.is_none());
    }

    #[tokio::test]
    async fn empty_reply_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_2",
                "content": [],
                "model": "claude-3-5-haiku-20241022",
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let client = AnthropicClient::new("k", "2023-06-01", "claude-3-5-haiku-20241022")
            .unwrap()
            .with_endpoint(server.uri());
        let model = AnthropicModel::with_client(client);

        let err = model.generate("hi", &[], &options()).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::Provider { .. }));
    }
}
