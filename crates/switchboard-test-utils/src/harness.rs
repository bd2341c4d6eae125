// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a [`JobProcessor`] over in-memory stores, a mock
//! model, recording channels and a manual clock. Provides `customer_says()`
//! to enqueue work and `wait_for()` to observe the job's final state.

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{
    ChannelAdapter, ChannelType, Clock, Conversation, ConversationStore, DeliveryStatus, Job,
    JobContext, Message, MessageMetadata, Sender, SwitchboardError,
};
use switchboard_engine::JobProcessor;

use crate::clock::ManualClock;
use crate::mock_channel::RecordingChannel;
use crate::mock_model::MockModel;
use crate::stores::{InMemoryConversationStore, InMemoryJobStore};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SwitchboardConfig,
    responses: Vec<String>,
    channels: Vec<ChannelType>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: SwitchboardConfig::default(),
            responses: Vec::new(),
            channels: Vec::new(),
        }
    }

    /// Adjust the configuration before the processor is built.
    pub fn with_config(mut self, configure: impl FnOnce(&mut SwitchboardConfig)) -> Self {
        configure(&mut self.config);
        self
    }

    /// Set mock model replies.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Register a recording adapter for `channel`.
    pub fn with_channel(mut self, channel: ChannelType) -> Self {
        self.channels.push(channel);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub fn build(self) -> Result<TestHarness, SwitchboardError> {
        let clock = Arc::new(ManualClock::default());
        let jobs = Arc::new(InMemoryJobStore::new(clock.clone()));
        let conversations = Arc::new(InMemoryConversationStore::new());
        let model = Arc::new(MockModel::with_responses(self.responses));
        let channels: Vec<Arc<RecordingChannel>> = self
            .channels
            .into_iter()
            .map(|c| Arc::new(RecordingChannel::new(c)))
            .collect();

        let mut builder = JobProcessor::builder(self.config.clone())
            .job_store(jobs.clone())
            .conversation_store(conversations.clone())
            .model(model.clone())
            .clock(clock.clone());
        for channel in &channels {
            builder = builder.channel(channel.clone());
        }

        Ok(TestHarness {
            processor: Arc::new(builder.build()?),
            config: self.config,
            clock,
            jobs,
            conversations,
            model,
            channels,
        })
    }
}

/// A complete engine wired to test doubles.
pub struct TestHarness {
    pub processor: Arc<JobProcessor>,
    pub config: SwitchboardConfig,
    pub clock: Arc<ManualClock>,
    pub jobs: Arc<InMemoryJobStore>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub model: Arc<MockModel>,
    pub channels: Vec<Arc<RecordingChannel>>,
}

impl TestHarness {
    /// Create a new test harness builder.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Create a conversation on `channel`.
    pub async fn conversation(&self, id: &str, channel: ChannelType) -> Conversation {
        let conversation = Conversation::new(id, channel, self.clock.now());
        self.conversations
            .insert_conversation(conversation.clone())
            .await;
        conversation
    }

    /// Store an inbound customer message and enqueue a reply job for it.
    pub async fn customer_says(&self, conversation_id: &str, text: &str) -> Job {
        let channel = self
            .conversations
            .conversation(conversation_id)
            .await
            .map(|c| c.channel_type)
            .unwrap_or(ChannelType::Widget);
        let now = self.clock.now();

        let message = Message {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.to_string(),
            sender: Sender::Customer,
            content: text.to_string(),
            channel_type: channel,
            delivery_status: DeliveryStatus::Delivered,
            created_at: now,
            metadata: MessageMetadata::default(),
        };
        // The in-memory store only refuses writes when told to.
        let _ = self.conversations.create_message(&message).await;

        let job = Job::pending(
            format!("job-{}", uuid::Uuid::new_v4()),
            conversation_id,
            message.id,
            text,
            now,
        )
        .with_context(&JobContext::for_channel(channel));
        self.jobs.enqueue(job.clone()).await;
        job
    }

    /// Poll until the job is completed or failed, or `timeout` passes.
    pub async fn wait_for(&self, job_id: &str, timeout: Duration) -> Option<Job> {
        let poll = async {
            loop {
                if let Some(job) = self.jobs.job(job_id).await
                    && job.status.is_terminal()
                {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.ok()
    }

    /// The recording adapter for `channel`, if one was registered.
    pub fn channel(&self, channel: ChannelType) -> Option<Arc<RecordingChannel>> {
        self.channels
            .iter()
            .find(|c| c.channel_type() == channel)
            .cloned()
    }
}
