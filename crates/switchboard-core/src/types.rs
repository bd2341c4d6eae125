// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the engine, the stores, and the collaborator traits.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SwitchboardError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    LanguageModel,
    JobStore,
    ConversationStore,
    Observability,
}

/// Messaging channel a conversation lives on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelType {
    WhatsApp,
    Instagram,
    Email,
    Sms,
    Widget,
}

/// Lifecycle of a generation job.
///
/// `pending -> processing -> {completed | failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// Completed and failed jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One queued request to generate an automated reply for an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub user_message: String,
    /// Raw context payload as stored; parsed by [`Job::validate`].
    pub conversation_context: serde_json::Value,
    /// Higher values are claimed first.
    pub priority: i32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub confidence: Option<f64>,
    pub requires_human: Option<bool>,
    pub processing_time_ms: Option<u64>,
    pub error: Option<String>,
}

impl Job {
    /// Create a pending job with an empty context.
    pub fn pending(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        user_message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            user_message: user_message.into(),
            conversation_context: serde_json::Value::Null,
            priority: 0,
            status: JobStatus::Pending,
            created_at,
            completed_at: None,
            response: None,
            confidence: None,
            requires_human: None,
            processing_time_ms: None,
            error: None,
        }
    }

    /// Set the job priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a typed context payload.
    pub fn with_context(mut self, context: &JobContext) -> Self {
        self.conversation_context =
            serde_json::to_value(context).unwrap_or(serde_json::Value::Null);
        self
    }

    /// Check a claimed job and parse its context.
    ///
    /// A job that fails validation can never succeed and must be failed
    /// rather than retried.
    pub fn validate(&self) -> Result<JobContext, SwitchboardError> {
        if self.id.trim().is_empty() {
            return Err(SwitchboardError::InvalidJob("job id is empty".into()));
        }
        if self.conversation_id.trim().is_empty() {
            return Err(SwitchboardError::InvalidJob(format!(
                "job {} has no conversation id",
                self.id
            )));
        }
        if self.user_message.trim().is_empty() {
            return Err(SwitchboardError::InvalidJob(format!(
                "job {} has an empty user message",
                self.id
            )));
        }
        if self.status != JobStatus::Processing {
            return Err(SwitchboardError::InvalidJob(format!(
                "job {} was handed over in status {}",
                self.id, self.status
            )));
        }
        JobContext::from_value(&self.conversation_context)
            .map_err(|e| SwitchboardError::InvalidJob(format!("job {}: {e}", self.id)))
    }
}

/// Typed view of a job's `conversation_context` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContext {
    pub channel_type: ChannelType,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerProfile>,
    #[serde(default)]
    pub conversation_tags: Vec<String>,
}

impl JobContext {
    /// Context for a channel with no customer details.
    pub fn for_channel(channel_type: ChannelType) -> Self {
        Self {
            channel_type,
            language: None,
            customer: None,
            conversation_tags: Vec::new(),
        }
    }

    /// Parse a stored context payload.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

/// Snapshot of what is known about the customer at enqueue time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sender {
    Customer,
    Ai,
    Agent,
}

/// Outbound delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

/// Customer intent vocabulary used by the heuristics and the escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    Greeting,
    Question,
    OrderStatus,
    Billing,
    Support,
    Complaint,
    Escalation,
    General,
}

/// Coarse customer sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Why a reply was routed to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationReason {
    LowConfidence,
    Intent,
    Keyword,
    Sentiment,
}

/// Generation signals attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_human: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_reason: Option<EscalationReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub content: String,
    pub channel_type: ChannelType,
    pub delivery_status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

/// Operator-facing priority of a conversation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// The conversation fields the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub channel_type: ChannelType,
    pub priority: ConversationPriority,
    pub tags: Vec<String>,
    pub requires_human: bool,
    pub ai_confidence: Option<f64>,
    pub last_message: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
}

impl Conversation {
    /// A conversation with no messages yet.
    pub fn new(id: impl Into<String>, channel_type: ChannelType, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            channel_type,
            priority: ConversationPriority::Normal,
            tags: Vec::new(),
            requires_human: false,
            ai_confidence: None,
            last_message: None,
            last_activity: now,
            message_count: 0,
        }
    }

    /// Fold one appended message into the aggregate.
    ///
    /// `message_count` only grows, `last_activity` only moves forward and an
    /// escalation stays set until an operator clears it.
    pub fn apply(&mut self, update: &ConversationUpdate) {
        self.last_message = Some(update.last_message.clone());
        if update.last_activity > self.last_activity {
            self.last_activity = update.last_activity;
        }
        self.message_count += 1;
        self.requires_human |= update.requires_human;
        if update.ai_confidence.is_some() {
            self.ai_confidence = update.ai_confidence;
        }
    }
}

/// Aggregate change caused by appending one message to a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationUpdate {
    pub last_message: String,
    pub last_activity: DateTime<Utc>,
    pub requires_human: bool,
    pub ai_confidence: Option<f64>,
}

/// A prior turn handed to the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub sender: Sender,
    pub content: String,
}

impl From<&Message> for HistoryTurn {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender,
            content: message.content.clone(),
        }
    }
}

/// Per-call options for the language model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub channel_type: ChannelType,
    pub language: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    /// Time left before the caller abandons the call. Clients use it to skip
    /// retries that could not finish in time.
    pub time_budget: Option<Duration>,
}

/// What the language model returned. Signals it did not supply are derived downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    pub confidence: Option<f64>,
    pub intent: Option<Intent>,
    pub sentiment: Option<Sentiment>,
}

impl GenerationResponse {
    /// A response carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            intent: None,
            sentiment: None,
        }
    }
}

/// Outcome written back to the job store for a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub response: String,
    pub confidence: f64,
    pub requires_human: bool,
    pub processing_time_ms: u64,
    pub intent: Option<Intent>,
    pub sentiment: Option<Sentiment>,
}

/// One response-time observation kept by the metrics aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub message_id: String,
    pub conversation_id: String,
    pub response_time_ms: u64,
    pub confidence: f64,
    pub requires_human: bool,
    pub channel_type: ChannelType,
    pub timestamp: DateTime<Utc>,
}
