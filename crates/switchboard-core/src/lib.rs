// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard reply engine.
//!
//! This crate provides the error type, the domain types (jobs, messages,
//! conversations, performance samples) and the collaborator traits the
//! orchestration engine consumes. Stores, model clients and channel
//! adapters implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SwitchboardError;
pub use types::{
    AdapterType, ChannelType, Conversation, ConversationPriority, ConversationUpdate, CustomerProfile,
    DeliveryStatus, EscalationReason,
    GenerationOptions, GenerationResponse, HealthStatus, HistoryTurn, Intent, Job, JobCompletion,
    JobContext, JobStatus, Message, MessageMetadata, PerformanceSample, Sender, Sentiment,
};

pub use traits::{
    ChannelAdapter, Clock, ConversationStore, JobStore, LanguageModel, PluginAdapter, SystemClock,
};
