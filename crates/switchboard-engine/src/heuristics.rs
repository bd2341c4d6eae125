// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic confidence, intent and sentiment signals.
//!
//! Used when the language model returns text without its own signals.
//! Confidence comes from the generated reply; intent and sentiment come from
//! the customer's message.

use switchboard_config::model::HeuristicsConfig;
use switchboard_core::{GenerationResponse, Intent, Sentiment};

/// Lowest confidence any reply can carry.
pub const MIN_CONFIDENCE: f64 = 0.1;

/// Highest confidence any reply can carry.
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Intent vocabulary, checked in order. The first intent with a hit wins.
const INTENT_VOCABULARY: &[(Intent, &[&str])] = &[
    (
        Intent::Escalation,
        &[
            "speak to a human",
            "talk to a human",
            "real person",
            "speak to someone",
            "talk to someone",
            "representative",
            "supervisor",
            "escalate",
        ],
    ),
    (
        Intent::Complaint,
        &[
            "complaint",
            "complain",
            "unacceptable",
            "disappointed",
            "ridiculous",
            "terrible",
            "horrible",
            "awful",
            "worst",
        ],
    ),
    (
        Intent::Billing,
        &[
            "bill",
            "billing",
            "invoice",
            "charge",
            "charged",
            "payment",
            "refund",
            "price",
            "subscription",
        ],
    ),
    (
        Intent::OrderStatus,
        &[
            "where is my",
            "order",
            "tracking",
            "shipped",
            "shipping",
            "delivery",
            "package",
            "arrive",
        ],
    ),
    (
        Intent::Support,
        &[
            "not working",
            "doesn't work",
            "help",
            "issue",
            "problem",
            "broken",
            "error",
            "fix",
            "support",
        ],
    ),
];

const QUESTION_OPENERS: &[&str] = &[
    "what", "how", "when", "where", "why", "who", "which", "can", "could", "is", "are", "do",
    "does",
];

const GREETINGS: &[&str] = &[
    "good morning",
    "good afternoon",
    "good evening",
    "thank you",
    "hello",
    "hey",
    "hi",
    "thanks",
];

const NEGATIVE_WORDS: &[&str] = &[
    "not happy",
    "never again",
    "angry",
    "upset",
    "terrible",
    "awful",
    "worst",
    "hate",
    "horrible",
    "frustrated",
    "disappointed",
    "unacceptable",
    "ridiculous",
    "useless",
    "bad",
];

const POSITIVE_WORDS: &[&str] = &[
    "thank you",
    "thanks",
    "great",
    "awesome",
    "love",
    "excellent",
    "perfect",
    "happy",
    "amazing",
    "appreciate",
    "good",
];

/// Clamp a confidence into `[MIN_CONFIDENCE, MAX_CONFIDENCE]`. NaN maps to the floor.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Suffixes accepted by [`Normalized::mentions_inflected`]. "led" and "ling"
/// cover the doubled consonant in "cancelled" and "cancelling".
const INFLECTIONS: &[&str] = &["", "s", "es", "ed", "d", "ing", "led", "ling"];

/// Lowercased text plus its word tokens, for phrase matching.
#[derive(Debug)]
pub(crate) struct Normalized {
    lower: String,
    tokens: Vec<String>,
}

impl Normalized {
    pub(crate) fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let tokens = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { lower, tokens }
    }

    /// Single words match whole tokens; anything longer matches as a substring.
    pub(crate) fn mentions(&self, phrase: &str) -> bool {
        let phrase = phrase.trim().to_lowercase();
        if phrase.is_empty() {
            return false;
        }
        if phrase.chars().all(char::is_alphanumeric) {
            self.tokens.iter().any(|t| *t == phrase)
        } else {
            self.lower.contains(&phrase)
        }
    }

    /// Like [`mentions`](Self::mentions), but a single word also matches its
    /// common inflections: "refunds", "refunded", "cancelled", "humans".
    pub(crate) fn mentions_inflected(&self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        if word.is_empty() || !word.chars().all(char::is_alphanumeric) {
            return self.mentions(&word);
        }
        self.tokens.iter().any(|t| {
            t.strip_prefix(word.as_str())
                .is_some_and(|rest| INFLECTIONS.contains(&rest))
        })
    }

    fn mentions_any<S: AsRef<str>>(&self, phrases: &[S]) -> bool {
        phrases.iter().any(|p| self.mentions(p.as_ref()))
    }

    fn count<S: AsRef<str>>(&self, phrases: &[S]) -> usize {
        phrases.iter().filter(|p| self.mentions(p.as_ref())).count()
    }

    fn first_token(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }
}

/// Signals attached to a generated reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub confidence: f64,
    pub intent: Intent,
    pub sentiment: Sentiment,
}

/// Derives reply signals from configured phrase lists.
#[derive(Debug, Clone)]
pub struct SignalAnalyzer {
    config: HeuristicsConfig,
}

impl SignalAnalyzer {
    pub fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    /// Confidence in a generated reply, from its length and phrasing.
    pub fn confidence(&self, reply: &str) -> f64 {
        let text = Normalized::new(reply);
        let mut score = self.config.base_confidence;

        if reply.trim().chars().count() < self.config.short_response_chars {
            score -= self.config.short_response_penalty;
        }
        if text.mentions_any(&self.config.hedging_phrases) {
            score -= self.config.hedge_penalty;
        }
        if text.mentions_any(&self.config.action_phrases) {
            score += self.config.action_bonus;
        }

        clamp_confidence(score)
    }

    /// What the customer is asking for.
    pub fn intent(&self, customer_message: &str) -> Intent {
        let text = Normalized::new(customer_message);

        if let Some((intent, _)) = INTENT_VOCABULARY
            .iter()
            .find(|(_, phrases)| text.mentions_any(*phrases))
        {
            return *intent;
        }

        let asks = customer_message.trim_end().ends_with('?')
            || text
                .first_token()
                .is_some_and(|first| QUESTION_OPENERS.contains(&first));
        if asks {
            return Intent::Question;
        }

        if text.mentions_any(GREETINGS) {
            return Intent::Greeting;
        }

        Intent::General
    }

    /// How the customer feels, by counting polar words.
    pub fn sentiment(&self, customer_message: &str) -> Sentiment {
        let text = Normalized::new(customer_message);
        let negative = text.count(NEGATIVE_WORDS);
        let positive = text.count(POSITIVE_WORDS);

        match negative.cmp(&positive) {
            std::cmp::Ordering::Greater => Sentiment::Negative,
            std::cmp::Ordering::Less => Sentiment::Positive,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }

    /// Complete the model's response with derived signals where it gave none.
    ///
    /// Model-supplied confidence is still clamped.
    pub fn signals(&self, customer_message: &str, response: &GenerationResponse) -> Signals {
        Signals {
            confidence: response
                .confidence
                .map(clamp_confidence)
                .unwrap_or_else(|| self.confidence(&response.text)),
            intent: response
                .intent
                .unwrap_or_else(|| self.intent(customer_message)),
            sentiment: response
                .sentiment
                .unwrap_or_else(|| self.sentiment(customer_message)),
        }
    }
}

impl Default for SignalAnalyzer {
    fn default() -> Self {
        Self::new(HeuristicsConfig::default())
    }
}
