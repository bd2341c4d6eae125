// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message and conversation persistence trait.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Conversation, ConversationUpdate, Message};

/// Storage for messages and the conversation aggregates derived from them.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Look up a conversation by id.
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, SwitchboardError>;

    /// Return up to `limit` most recent messages, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SwitchboardError>;

    /// Persist a new message.
    async fn create_message(&self, message: &Message) -> Result<(), SwitchboardError>;

    /// Fold one appended message into the conversation aggregate.
    ///
    /// `message_count` grows by one, `last_activity` never moves backwards and
    /// `requires_human` is only ever set, never cleared.
    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: &ConversationUpdate,
    ) -> Result<(), SwitchboardError>;
}
