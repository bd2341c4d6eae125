// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply orchestration for Switchboard.
//!
//! The [`JobProcessor`] is the central coordinator that:
//! - Claims pending reply jobs on a fixed tick, bounded by a concurrency limit
//! - Generates replies under a deadline, falling back to a safe apology
//! - Decides whether a human must take over the conversation
//! - Collapses concurrent jobs for one conversation into a single generation
//! - Stores and delivers the reply, then pushes it to live subscribers
//! - Keeps rolling response metrics

pub mod coordinator;
pub mod escalation;
pub mod heuristics;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod publisher;
pub mod router;
pub mod shutdown;

mod telemetry;

pub use coordinator::{ConversationCoordinator, Flight};
pub use escalation::{EscalationDecision, EscalationPolicy};
pub use heuristics::{SignalAnalyzer, Signals};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use pipeline::{FallbackCause, GenerationPipeline, PipelineOutput};
pub use processor::{
    JobProcessor, JobProcessorBuilder, ProcessorSettings, ProcessorStatus, SharedReply,
};
pub use publisher::{
    Callback, PublishReport, RealtimePublisher, ScopedSubscription, SubscriberError,
    SubscriptionHandle, SubscriptionId,
};
pub use router::{ChannelRouter, DeliveryOutcome};
pub use shutdown::{graceful_shutdown, install_signal_handler};
