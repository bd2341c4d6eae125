// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for outbound delivery (WhatsApp, email, SMS, etc.).

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelType, Conversation};

/// Adapter that delivers reply text to the customer on one channel.
///
/// The engine never sees channel-specific formats; it hands over plain text.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// The channel this adapter delivers to.
    fn channel_type(&self) -> ChannelType;

    /// Deliver `text` to the customer behind `conversation`.
    ///
    /// Returns the channel's identifier for the delivered message.
    async fn deliver(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<String, SwitchboardError>;
}
