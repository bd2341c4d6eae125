// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events feed of new messages for one conversation.
//!
//! Each connection holds a scoped subscription on the engine's publisher.
//! The subscription lives inside the response stream, so it is removed as
//! soon as axum drops the stream on client disconnect.
//!
//! ```text
//! event: message
//! data: {"id": "...", "conversation_id": "...", "sender": "ai", ...}
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use switchboard_core::Message;
use switchboard_engine::{Callback, SubscriberError};
use tokio::sync::mpsc;
use tracing::debug;

use crate::server::GatewayState;

/// Messages buffered per connection before the subscriber reports failure.
const EVENT_BUFFER: usize = 64;

/// GET /v1/conversations/{id}/events
pub async fn conversation_events(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Message>(EVENT_BUFFER);

    let callback: Callback = Arc::new(move |message: &Message| -> Result<(), SubscriberError> {
        tx.try_send(message.clone())
            .map_err(|e| SubscriberError::from(e.to_string()))
    });
    let subscription = state
        .processor
        .publisher()
        .subscribe_scoped(&conversation_id, callback);
    debug!(conversation_id = %conversation_id, "event stream opened");

    let events = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        let message = rx.recv().await?;
        let event = match Event::default().event("message").json_data(&message) {
            Ok(event) => event,
            Err(e) => Event::default().event("error").data(e.to_string()),
        };
        Some((Ok(event), (rx, subscription)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
