// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages API transport.
//!
//! One POST per attempt. A transient failure (rate limit, overload, refused
//! connection) is retried once, and only when the wait fits in the caller's
//! remaining time budget. Otherwise the failure is returned at once so the
//! engine still has time to send its fallback reply.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use switchboard_core::SwitchboardError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

const MESSAGES_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Upper bound for one attempt when the caller gives no budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Authenticated client for the Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    model: String,
    endpoint: String,
    retry_delay: Duration,
}

/// Outcome of a single POST that did not fail permanently.
enum Attempt {
    Done(MessageResponse),
    Transient {
        error: SwitchboardError,
        retry_after: Option<Duration>,
    },
}

impl AnthropicClient {
    pub fn new(
        api_key: &str,
        api_version: &str,
        model: impl Into<String>,
    ) -> Result<Self, SwitchboardError> {
        let header = |name: &str, value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| SwitchboardError::Config(format!("invalid {name} header: {e}")))
        };
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", header("x-api-key", api_key)?);
        headers.insert("anthropic-version", header("anthropic-version", api_version)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| provider("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            model: model.into(),
            endpoint: MESSAGES_ENDPOINT.to_string(),
            retry_delay: RETRY_DELAY,
        })
    }

    /// Model named in every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    #[cfg(test)]
    pub(crate) fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self.retry_delay = Duration::from_millis(10);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Send `request`, retrying one transient failure if `budget` allows it.
    ///
    /// `budget` is the time the caller is still willing to wait. Each attempt
    /// is cut off when it runs out.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
        budget: Option<Duration>,
    ) -> Result<MessageResponse, SwitchboardError> {
        let started = Instant::now();
        let remaining = || budget.map(|b| b.saturating_sub(started.elapsed()));

        let (error, retry_after) = match self.attempt(request, budget).await? {
            Attempt::Done(response) => return Ok(response),
            Attempt::Transient { error, retry_after } => (error, retry_after),
        };

        let wait = retry_after.unwrap_or(self.retry_delay);
        if let Some(left) = remaining()
            && wait >= left
        {
            warn!(
                error = %error,
                wait_ms = wait.as_millis() as u64,
                left_ms = left.as_millis() as u64,
                "transient API error, no time left to retry"
            );
            return Err(error);
        }

        warn!(
            error = %error,
            wait_ms = wait.as_millis() as u64,
            "transient API error, retrying once"
        );
        tokio::time::sleep(wait).await;
        match self.attempt(request, remaining()).await? {
            Attempt::Done(response) => Ok(response),
            Attempt::Transient { error, .. } => Err(error),
        }
    }

    async fn attempt(
        &self,
        request: &MessageRequest,
        budget: Option<Duration>,
    ) -> Result<Attempt, SwitchboardError> {
        let mut post = self.http.post(&self.endpoint).json(request);
        if let Some(budget) = budget {
            post = post.timeout(budget.min(REQUEST_TIMEOUT));
        }

        let response = match post.send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Ok(Attempt::Transient {
                    error: provider("could not reach the Messages API", e),
                    retry_after: None,
                });
            }
            Err(e) => return Err(provider("Messages API request failed", e)),
        };

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .map_err(|e| provider("failed to read Messages API response", e))?;
        debug!(%status, bytes = body.len(), "Messages API responded");

        if status.is_success() {
            return serde_json::from_str(&body)
                .map(Attempt::Done)
                .map_err(|e| SwitchboardError::Provider {
                    message: format!("unexpected Messages API response: {e}"),
                    source: Some(Box::new(e)),
                });
        }

        let error = api_error(status, &body);
        if is_transient(status) {
            Ok(Attempt::Transient { error, retry_after })
        } else {
            Err(error)
        }
    }
}

/// Rate limiting and overload. Anthropic uses 529 for the latter.
fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

fn api_error(status: StatusCode, body: &str) -> SwitchboardError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => format!(
            "Messages API {status} {}: {}",
            parsed.error.type_, parsed.error.message
        ),
        Err(_) => format!("Messages API {status}: {body}"),
    };
    SwitchboardError::Provider {
        message,
        source: None,
    }
}

fn provider(context: &str, e: reqwest::Error) -> SwitchboardError {
    SwitchboardError::Provider {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}
