// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time fan-out of new messages to per-conversation subscribers.
//!
//! Callbacks run synchronously inside [`RealtimePublisher::publish`] in
//! registration order. A callback that returns an error or panics is logged
//! and skipped; the remaining callbacks still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use switchboard_core::Message;
use tracing::{debug, warn};

/// Error type returned by subscriber callbacks.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber callback.
pub type Callback = Arc<dyn Fn(&Message) -> Result<(), SubscriberError> + Send + Sync>;

/// Identifies one registration across all conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Returned by [`RealtimePublisher::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    conversation_id: String,
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// Delivery counts for one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Registration {
    id: SubscriptionId,
    callback: Callback,
}

/// Registry of subscriber callbacks keyed by conversation id.
#[derive(Default)]
pub struct RealtimePublisher {
    registry: DashMap<String, Vec<Registration>>,
    next_id: AtomicU64,
}

impl RealtimePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `conversation_id`.
    ///
    /// Registering the same callback (by `Arc` identity) twice for the same
    /// conversation returns the existing handle.
    pub fn subscribe(&self, conversation_id: &str, callback: Callback) -> SubscriptionHandle {
        let mut registrations = self
            .registry
            .entry(conversation_id.to_string())
            .or_default();

        if let Some(existing) = registrations
            .iter()
            .find(|r| Arc::ptr_eq(&r.callback, &callback))
        {
            return SubscriptionHandle {
                conversation_id: conversation_id.to_string(),
                id: existing.id,
            };
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        registrations.push(Registration { id, callback });
        debug!(conversation_id, subscription = id.0, "subscriber added");

        SubscriptionHandle {
            conversation_id: conversation_id.to_string(),
            id,
        }
    }

    /// Register a callback that is removed when the returned guard drops.
    pub fn subscribe_scoped(
        self: &Arc<Self>,
        conversation_id: &str,
        callback: Callback,
    ) -> ScopedSubscription {
        let handle = self.subscribe(conversation_id, callback);
        ScopedSubscription {
            publisher: Arc::clone(self),
            handle,
        }
    }

    /// Remove exactly the registration behind `handle`.
    ///
    /// Returns `false` when it was already removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = match self.registry.get_mut(&handle.conversation_id) {
            Some(mut registrations) => {
                let before = registrations.len();
                registrations.retain(|r| r.id != handle.id);
                before != registrations.len()
            }
            None => false,
        };

        self.registry
            .remove_if(&handle.conversation_id, |_, registrations| {
                registrations.is_empty()
            });

        if removed {
            debug!(
                conversation_id = handle.conversation_id.as_str(),
                subscription = handle.id.0,
                "subscriber removed"
            );
        }
        removed
    }

    /// Invoke every callback registered for the message's conversation.
    pub fn publish(&self, message: &Message) -> PublishReport {
        // Snapshot under the shard lock, then call outside it so callbacks
        // may subscribe or unsubscribe without deadlocking.
        let callbacks: Vec<(SubscriptionId, Callback)> = match self
            .registry
            .get(&message.conversation_id)
        {
            Some(registrations) => registrations
                .iter()
                .map(|r| (r.id, Arc::clone(&r.callback)))
                .collect(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for (id, callback) in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(message))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(
                        conversation_id = message.conversation_id.as_str(),
                        subscription = id.0,
                        error = %e,
                        "subscriber callback failed"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(
                        conversation_id = message.conversation_id.as_str(),
                        subscription = id.0,
                        "subscriber callback panicked"
                    );
                }
            }
        }
        report
    }

    /// Number of callbacks registered for a conversation.
    pub fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.registry
            .get(conversation_id)
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Number of conversations with at least one subscriber.
    pub fn conversation_count(&self) -> usize {
        self.registry.len()
    }
}

/// Owner-scoped subscription; unsubscribes on drop.
pub struct ScopedSubscription {
    publisher: Arc<RealtimePublisher>,
    handle: SubscriptionHandle,
}

impl ScopedSubscription {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        self.publisher.unsubscribe(&self.handle);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use switchboard_core::{ChannelType, DeliveryStatus, MessageMetadata, Sender};
    use tracing_test::traced_test;

    use super::*;

    fn message(conversation_id: &str, content: &str) -> Message {
        Message {
            id: format!("{conversation_id}-{content}"),
            conversation_id: conversation_id.into(),
            sender: Sender::Ai,
            content: content.into(),
            channel_type: ChannelType::Widget,
            delivery_status: DeliveryStatus::Sent,
            created_at: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Callback {
        let log = log.clone();
        Arc::new(move |m: &Message| -> Result<(), SubscriberError> {
            log.lock().unwrap().push(format!("{tag}:{}", m.content));
            Ok(())
        })
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let publisher = RealtimePublisher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        publisher.subscribe("c1", recorder(&log, "a"));
        publisher.subscribe("c1", recorder(&log, "b"));
        publisher.subscribe("c1", recorder(&log, "c"));

        let report = publisher.publish(&message("c1", "hi"));

        assert_eq!(report.delivered, 3);
        assert_eq!(*log.lock().unwrap(), vec!["a:hi", "b:hi", "c:hi"]);
    }

    #[test]
    fn only_matching_conversation_is_notified() {
        let publisher = RealtimePublisher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        publisher.subscribe("c1", recorder(&log, "one"));
        publisher.subscribe("c2", recorder(&log, "two"));

        publisher.publish(&message("c2", "x"));
        assert_eq!(*log.lock().unwrap(), vec!["two:x"]);

        let report = publisher.publish(&message("c3", "y"));
        assert_eq!(report, PublishReport::default());
    }

    #[test]
    fn subscribe_then_unsubscribe_restores_previous_set() {
        let publisher = RealtimePublisher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        publisher.subscribe("c1", recorder(&log, "keep"));
        assert_eq!(publisher.subscriber_count("c1"), 1);

        let handle = publisher.subscribe("c1", recorder(&log, "gone"));
        assert_eq!(publisher.subscriber_count("c1"), 2);
        assert!(publisher.unsubscribe(&handle));
        assert!(!publisher.unsubscribe(&handle));
        assert_eq!(publisher.subscriber_count("c1"), 1);

        publisher.publish(&message("c1", "m"));
        assert_eq!(*log.lock().unwrap(), vec!["keep:m"]);
    }

    #[test]
    fn resubscribing_the_same_callback_is_idempotent() {
        let publisher = RealtimePublisher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let callback = recorder(&log, "a");

        let first = publisher.subscribe("c1", callback.clone());
        let second = publisher.subscribe("c1", callback);
        assert_eq!(first, second);
        assert_eq!(publisher.subscriber_count("c1"), 1);

        publisher.unsubscribe(&first);
        assert_eq!(publisher.subscriber_count("c1"), 0);
        assert_eq!(publisher.conversation_count(), 0);
    }

    #[traced_test]
    #[test]
    fn failing_callbacks_do_not_block_the_rest() {
        let publisher = RealtimePublisher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        publisher.subscribe(
            "c1",
            Arc::new(|_: &Message| -> Result<(), SubscriberError> { Err("socket closed".into()) }),
        );
        publisher.subscribe(
            "c1",
            Arc::new(|_: &Message| -> Result<(), SubscriberError> { panic!("bad subscriber") }),
        );
        publisher.subscribe("c1", recorder(&log, "ok"));

        let report = publisher.publish(&message("c1", "z"));

        assert_eq!(report, PublishReport { delivered: 1, failed: 2 });
        assert_eq!(*log.lock().unwrap(), vec!["ok:z"]);
        assert!(logs_contain("subscriber callback failed"));
        assert!(logs_contain("subscriber callback panicked"));
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let publisher = Arc::new(RealtimePublisher::new());
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));

        let callback: Callback = {
            let publisher = publisher.clone();
            let slot = slot.clone();
            Arc::new(move |_: &Message| -> Result<(), SubscriberError> {
                if let Some(handle) = slot.lock().unwrap().take() {
                    publisher.unsubscribe(&handle);
                }
                Ok(())
            })
        };
        let handle = publisher.subscribe("c1", callback);
        *slot.lock().unwrap() = Some(handle);

        assert_eq!(publisher.publish(&message("c1", "a")).delivered, 1);
        assert_eq!(publisher.publish(&message("c1", "b")).delivered, 0);
    }

    #[test]
    fn scoped_subscription_unsubscribes_on_drop() {
        let publisher = Arc::new(RealtimePublisher::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let _scope = publisher.subscribe_scoped("c1", recorder(&log, "s"));
            publisher.publish(&message("c1", "1"));
        }
        publisher.publish(&message("c1", "2"));

        assert_eq!(*log.lock().unwrap(), vec!["s:1"]);
        assert_eq!(publisher.conversation_count(), 0);
    }
}
