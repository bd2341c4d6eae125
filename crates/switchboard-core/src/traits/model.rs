// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language model trait for reply generation backends.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationOptions, GenerationResponse, HistoryTurn};

/// Adapter for the service that writes reply text.
///
/// Calls may fail or hang; the engine always bounds them with a deadline and
/// drops the returned future when the deadline fires.
#[async_trait]
pub trait LanguageModel: PluginAdapter {
    /// Generate a reply for `prompt` given the prior turns of the conversation.
    async fn generate(
        &self,
        prompt: &str,
        history: &[HistoryTurn],
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, SwitchboardError>;
}
