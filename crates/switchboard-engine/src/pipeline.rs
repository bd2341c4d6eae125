// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadline-bounded reply generation.
//!
//! The [`GenerationPipeline`] assembles context for a claimed job, calls the
//! language model and fills in missing signals. The whole run, context fetch
//! included, races a hard deadline. On timeout or error it yields the
//! configured fallback reply instead of failing.

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::model::{GenerationConfig, HeuristicsConfig};
use switchboard_core::{
    ConversationStore, GenerationOptions, HistoryTurn, Intent, Job, JobContext, LanguageModel,
    Sentiment, SwitchboardError,
};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::heuristics::{clamp_confidence, SignalAnalyzer};

/// Why the fallback reply was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// The deadline elapsed before the model answered.
    Timeout,
    /// Context assembly or the model call failed.
    Error(String),
}

impl FallbackCause {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FallbackCause::Timeout => "timeout",
            FallbackCause::Error(_) => "error",
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub response: String,
    pub confidence: f64,
    pub intent: Option<Intent>,
    pub sentiment: Option<Sentiment>,
    /// Set when the reply is the fallback rather than a generation.
    pub fallback: Option<FallbackCause>,
}

impl PipelineOutput {
    /// A generated reply with full signals.
    pub fn generated(
        response: impl Into<String>,
        confidence: f64,
        intent: Intent,
        sentiment: Sentiment,
    ) -> Self {
        Self {
            response: response.into(),
            confidence: clamp_confidence(confidence),
            intent: Some(intent),
            sentiment: Some(sentiment),
            fallback: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Builds context, calls the model under a deadline and derives signals.
pub struct GenerationPipeline {
    model: Arc<dyn LanguageModel>,
    conversations: Arc<dyn ConversationStore>,
    analyzer: SignalAnalyzer,
    config: GenerationConfig,
    deadline: Duration,
}

impl GenerationPipeline {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        conversations: Arc<dyn ConversationStore>,
        config: GenerationConfig,
        heuristics: HeuristicsConfig,
        deadline: Duration,
    ) -> Self {
        Self {
            model,
            conversations,
            analyzer: SignalAnalyzer::new(heuristics),
            config,
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run the pipeline for one validated job. Never fails.
    ///
    /// When the deadline fires the in-progress generation future is dropped,
    /// which cancels an in-flight HTTP request with it.
    pub async fn run(&self, job: &Job, context: &JobContext) -> PipelineOutput {
        let deadline = Instant::now() + self.deadline;
        match tokio::time::timeout_at(deadline, self.generate(job, context, deadline)).await {
            Ok(Ok(output)) => {
                debug!(
                    job_id = %job.id,
                    confidence = output.confidence,
                    "generation finished"
                );
                output
            }
            Ok(Err(e)) => {
                warn!(job_id = %job.id, error = %e, "generation failed, using fallback reply");
                self.fallback(FallbackCause::Error(e.to_string()))
            }
            Err(_) => {
                warn!(
                    job_id = %job.id,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "generation missed its deadline, using fallback reply"
                );
                self.fallback(FallbackCause::Timeout)
            }
        }
    }

    /// The fixed reply used when generation cannot finish safely.
    pub fn fallback(&self, cause: FallbackCause) -> PipelineOutput {
        PipelineOutput {
            response: self.config.fallback_response.clone(),
            confidence: self.config.fallback_confidence,
            intent: None,
            sentiment: None,
            fallback: Some(cause),
        }
    }

    async fn generate(
        &self,
        job: &Job,
        context: &JobContext,
        deadline: Instant,
    ) -> Result<PipelineOutput, SwitchboardError> {
        let history = self.history(job).await?;
        let options = self.options(context, deadline.saturating_duration_since(Instant::now()));

        let response = self
            .model
            .generate(&job.user_message, &history, &options)
            .await?;

        if response.text.trim().is_empty() {
            return Err(SwitchboardError::Provider {
                message: "model returned an empty reply".into(),
                source: None,
            });
        }

        let signals = self.analyzer.signals(&job.user_message, &response);
        Ok(PipelineOutput {
            response: response.text,
            confidence: signals.confidence,
            intent: Some(signals.intent),
            sentiment: Some(signals.sentiment),
            fallback: None,
        })
    }

    /// Up to `history_limit` prior messages, oldest first, excluding the
    /// inbound message the job answers.
    async fn history(&self, job: &Job) -> Result<Vec<HistoryTurn>, SwitchboardError> {
        let limit = self.config.history_limit;
        let messages = self
            .conversations
            .recent_messages(&job.conversation_id, limit + 1)
            .await?;

        let prior: Vec<HistoryTurn> = messages
            .iter()
            .filter(|m| m.id != job.message_id)
            .map(HistoryTurn::from)
            .collect();
        let skip = prior.len().saturating_sub(limit);
        Ok(prior.into_iter().skip(skip).collect())
    }

    fn options(&self, context: &JobContext, time_budget: Duration) -> GenerationOptions {
        GenerationOptions {
            channel_type: context.channel_type,
            language: context
                .language
                .clone()
                .unwrap_or_else(|| self.config.default_language.clone()),
            system_prompt: system_prompt(self.config.system_prompt.as_deref(), context),
            max_tokens: self.config.max_tokens,
            time_budget: Some(time_budget),
        }
    }
}

/// Configured system prompt followed by what is known about the customer.
fn system_prompt(base: Option<&str>, context: &JobContext) -> Option<String> {
    let mut sections: Vec<String> = base
        .filter(|b| !b.trim().is_empty())
        .map(|b| vec![b.trim().to_string()])
        .unwrap_or_default();

    let mut profile = vec![format!("Channel: {}", context.channel_type)];
    if let Some(customer) = &context.customer {
        if let Some(name) = &customer.name {
            profile.push(format!("Customer name: {name}"));
        }
        if !customer.tags.is_empty() {
            profile.push(format!("Customer tags: {}", customer.tags.join(", ")));
        }
        if let Some(notes) = &customer.notes {
            profile.push(format!("Notes: {notes}"));
        }
    }
    if !context.conversation_tags.is_empty() {
        profile.push(format!(
            "Conversation tags: {}",
            context.conversation_tags.join(", ")
        ));
    }
    sections.push(profile.join("\n"));

    Some(sections.join("\n\n"))
}
