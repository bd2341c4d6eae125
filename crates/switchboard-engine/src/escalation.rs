// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escalation policy.
//!
//! Decides whether a reply needs a human. Rules are evaluated in order and the
//! first match wins:
//!
//! 1. confidence below the threshold (or a fallback reply): `low_confidence`
//! 2. intent is `escalation` or `complaint`: `intent`
//! 3. the customer used an escalation keyword: `keyword`
//! 4. negative sentiment below the sentiment threshold: `sentiment`

use serde::Serialize;
use switchboard_config::model::EscalationConfig;
use switchboard_core::{EscalationReason, Intent, Sentiment};

use crate::heuristics::Normalized;
use crate::pipeline::PipelineOutput;

/// Outcome of the escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EscalationDecision {
    pub requires_human: bool,
    pub reason: Option<EscalationReason>,
}

impl EscalationDecision {
    pub const AUTOMATED: Self = Self {
        requires_human: false,
        reason: None,
    };

    fn escalate(reason: EscalationReason) -> Self {
        Self {
            requires_human: true,
            reason: Some(reason),
        }
    }
}

/// Pure decision function over a customer message and a pipeline result.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    confidence_threshold: f64,
    sentiment_confidence_threshold: f64,
    keywords: Vec<String>,
}

impl EscalationPolicy {
    pub fn new(config: &EscalationConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            sentiment_confidence_threshold: config.sentiment_confidence_threshold,
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn decide(&self, user_message: &str, output: &PipelineOutput) -> EscalationDecision {
        // A fallback reply always goes to a human, whatever the threshold.
        if output.is_fallback() || output.confidence < self.confidence_threshold {
            return EscalationDecision::escalate(EscalationReason::LowConfidence);
        }

        if matches!(output.intent, Some(Intent::Escalation | Intent::Complaint)) {
            return EscalationDecision::escalate(EscalationReason::Intent);
        }

        let text = Normalized::new(user_message);
        if self.keywords.iter().any(|k| text.mentions_inflected(k)) {
            return EscalationDecision::escalate(EscalationReason::Keyword);
        }

        if output.sentiment == Some(Sentiment::Negative)
            && output.confidence < self.sentiment_confidence_threshold
        {
            return EscalationDecision::escalate(EscalationReason::Sentiment);
        }

        EscalationDecision::AUTOMATED
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::new(&EscalationConfig::default())
    }
}
