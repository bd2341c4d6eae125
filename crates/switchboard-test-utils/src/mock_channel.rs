// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter that captures outbound replies.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::{
    AdapterType, ChannelAdapter, ChannelType, Conversation, HealthStatus, PluginAdapter,
    SwitchboardError,
};

/// A reply captured by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub conversation_id: String,
    pub text: String,
}

/// A channel adapter that records every reply instead of sending it.
pub struct RecordingChannel {
    channel: ChannelType,
    sent: Mutex<Vec<SentReply>>,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl RecordingChannel {
    pub fn new(channel: ChannelType) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        }
    }

    /// Reject deliveries until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Never answer deliveries until switched back.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Get all replies delivered so far.
    pub async fn sent(&self) -> Vec<SentReply> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for RecordingChannel {
    fn name(&self) -> &str {
        "recording-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        if self.failing.load(Ordering::SeqCst) {
            Ok(HealthStatus::Degraded("deliveries failing".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for RecordingChannel {
    fn channel_type(&self) -> ChannelType {
        self.channel
    }

    async fn deliver(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<String, SwitchboardError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SwitchboardError::Channel {
                message: format!("{} gateway rejected the reply", self.channel),
                source: None,
            });
        }

        self.sent.lock().await.push(SentReply {
            conversation_id: conversation.id.clone(),
            text: text.to_string(),
        });
        Ok(format!("mock-out-{}", uuid::Uuid::new_v4()))
    }
}
