// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes outbound replies to the adapter for each conversation's channel.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use switchboard_core::{ChannelAdapter, ChannelType, Conversation, HealthStatus};
use tracing::{debug, warn};

/// What happened when a reply was handed to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The adapter accepted the reply and returned its message id.
    Delivered(String),
    /// The adapter rejected the reply or did not answer in time.
    Failed(String),
    /// No adapter is registered for the channel; the reply is only stored.
    Unrouted,
}

const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Maps each channel to the adapter that delivers on it.
#[derive(Clone)]
pub struct ChannelRouter {
    adapters: BTreeMap<ChannelType, Arc<dyn ChannelAdapter>>,
    delivery_timeout: Duration,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self {
            adapters: BTreeMap::new(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long one adapter may take to accept a reply.
    pub fn set_delivery_timeout(&mut self, timeout: Duration) {
        self.delivery_timeout = timeout;
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }

    /// Register an adapter under the channel it reports. Replaces any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        let channel = adapter.channel_type();
        if self.adapters.insert(channel, adapter).is_some() {
            warn!(%channel, "replacing channel adapter");
        }
    }

    pub fn with(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn channels(&self) -> impl Iterator<Item = ChannelType> + '_ {
        self.adapters.keys().copied()
    }

    pub async fn deliver(&self, conversation: &Conversation, text: &str) -> DeliveryOutcome {
        let Some(adapter) = self.adapters.get(&conversation.channel_type) else {
            debug!(
                conversation_id = conversation.id.as_str(),
                channel = %conversation.channel_type,
                "no adapter for channel, reply stored only"
            );
            return DeliveryOutcome::Unrouted;
        };

        let delivery = adapter.deliver(conversation, text);
        let error = match tokio::time::timeout(self.delivery_timeout, delivery).await {
            Ok(Ok(id)) => return DeliveryOutcome::Delivered(id),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "delivery timed out after {}ms",
                self.delivery_timeout.as_millis()
            ),
        };
        warn!(
            conversation_id = conversation.id.as_str(),
            channel = %conversation.channel_type,
            error = %error,
            "reply delivery failed"
        );
        DeliveryOutcome::Failed(error)
    }

    /// Combined health of every registered adapter.
    pub async fn health(&self) -> HealthStatus {
        let mut problems = Vec::new();
        for (channel, adapter) in &self.adapters {
            match adapter.health_check().await {
                Ok(HealthStatus::Healthy) => {}
                Ok(HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason)) => {
                    problems.push(format!("{channel}: {reason}"));
                }
                Err(e) => problems.push(format!("{channel}: {e}")),
            }
        }

        if problems.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(problems.join("; "))
        }
    }

    /// Shut every adapter down, logging failures.
    pub async fn shutdown(&self) {
        for (channel, adapter) in &self.adapters {
            if let Err(e) = adapter.shutdown().await {
                warn!(%channel, error = %e, "channel shutdown error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use switchboard_core::{AdapterType, PluginAdapter, SwitchboardError};

    use super::*;

    struct FixedChannel {
        channel: ChannelType,
        fail: bool,
    }

    #[async_trait]
    impl PluginAdapter for FixedChannel {
        fn name(&self) -> &str {
            "fixed"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Channel
        }
        async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
            if self.fail {
                Ok(HealthStatus::Unhealthy("gateway down".into()))
            } else {
                Ok(HealthStatus::Healthy)
            }
        }
        async fn shutdown(&self) -> Result<(), SwitchboardError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ChannelAdapter for FixedChannel {
        fn channel_type(&self) -> ChannelType {
            self.channel
        }
        async fn deliver(
            &self,
            conversation: &Conversation,
            _text: &str,
        ) -> Result<String, SwitchboardError> {
            if self.fail {
                Err(SwitchboardError::Channel {
                    message: "gateway down".into(),
                    source: None,
                })
            } else {
                Ok(format!("out-{}", conversation.id))
            }
        }
    }

    fn router() -> ChannelRouter {
        ChannelRouter::new()
            .with(Arc::new(FixedChannel {
                channel: ChannelType::Sms,
                fail: false,
            }))
            .with(Arc::new(FixedChannel {
                channel: ChannelType::Email,
                fail: true,
            }))
    }

    #[tokio::test]
    async fn routes_by_conversation_channel() {
        let router = router();
        let sms = Conversation::new("c1", ChannelType::Sms, Utc::now());
        let email = Conversation::new("c2", ChannelType::Email, Utc::now());
        let widget = Conversation::new("c3", ChannelType::Widget, Utc::now());

        assert_eq!(
            router.deliver(&sms, "hi").await,
            DeliveryOutcome::Delivered("out-c1".into())
        );
        assert!(matches!(
            router.deliver(&email, "hi").await,
            DeliveryOutcome::Failed(e) if e.contains("gateway down")
        ));
        assert_eq!(router.deliver(&widget, "hi").await, DeliveryOutcome::Unrouted);
    }

    struct StalledChannel;

    #[async_trait]
    impl PluginAdapter for StalledChannel {
        fn name(&self) -> &str {
            "stalled"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Channel
        }
        async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), SwitchboardError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ChannelAdapter for StalledChannel {
        fn channel_type(&self) -> ChannelType {
            ChannelType::WhatsApp
        }
        async fn deliver(&self, _: &Conversation, _: &str) -> Result<String, SwitchboardError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_adapter_times_out_as_failed() {
        let mut router = ChannelRouter::new().with(Arc::new(StalledChannel));
        router.set_delivery_timeout(Duration::from_millis(750));
        let conversation = Conversation::new("c1", ChannelType::WhatsApp, Utc::now());

        let started = tokio::time::Instant::now();
        let outcome = router.deliver(&conversation, "hi").await;

        assert_eq!(
            outcome,
            DeliveryOutcome::Failed("delivery timed out after 750ms".into())
        );
        assert!(started.elapsed() >= Duration::from_millis(750));
    }

    #[tokio::test]
    async fn health_reports_degraded_channels() {
        let router = router();
        match router.health().await {
            HealthStatus::Degraded(reason) => assert_eq!(reason, "email: gateway down"),
            other => panic!("expected degraded, got {other:?}"),
        }
        assert_eq!(ChannelRouter::new().health().await, HealthStatus::Healthy);
        assert_eq!(
            router.channels().collect::<Vec<_>>(),
            vec![ChannelType::Email, ChannelType::Sms]
        );
    }
}
