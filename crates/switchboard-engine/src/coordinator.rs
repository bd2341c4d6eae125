// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-flight generation per conversation.
//!
//! While a generation for a conversation is in flight, further requests for
//! the same conversation await the existing result instead of starting their
//! own. The shared result is whatever the leader's future yields; the
//! processor runs generation and reply storage in it so joiners see both.
//! The in-flight entry is owned by the request that created it and is
//! removed by a drop guard, so it cannot outlive that request on any exit
//! path, including cancellation and panics.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

struct InFlight<T> {
    id: u64,
    output: Shared<BoxFuture<'static, T>>,
}

/// Result of [`ConversationCoordinator::run`].
#[derive(Debug, Clone)]
pub struct Flight<T> {
    pub output: T,
    /// Whether this caller started the generation. Joiners share the leader's output.
    pub leader: bool,
}

/// Collapses concurrent generations for the same conversation into one.
pub struct ConversationCoordinator<T> {
    in_flight: DashMap<String, InFlight<T>>,
    next_id: AtomicU64,
}

impl<T> Default for ConversationCoordinator<T> {
    fn default() -> Self {
        Self {
            in_flight: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ConversationCoordinator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `generate` for `conversation_id` unless a generation is already in
    /// flight, in which case `generate` is dropped unpolled and the existing
    /// result is awaited.
    pub async fn run<F>(&self, conversation_id: &str, generate: F) -> Flight<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (output, guard) = match self.in_flight.entry(conversation_id.to_string()) {
            Entry::Occupied(entry) => {
                debug!(conversation_id, "joining in-flight generation");
                (entry.get().output.clone(), None)
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let output = generate.boxed().shared();
                entry.insert(InFlight {
                    id,
                    output: output.clone(),
                });
                let guard = FlightGuard {
                    in_flight: &self.in_flight,
                    conversation_id: conversation_id.to_string(),
                    id,
                };
                (output, Some(guard))
            }
        };

        let output = output.await;
        let leader = guard.is_some();
        drop(guard);
        Flight { output, leader }
    }

    /// Number of conversations with a generation in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, conversation_id: &str) -> bool {
        self.in_flight.contains_key(conversation_id)
    }
}

/// Removes the leader's entry when the leader finishes or is dropped.
struct FlightGuard<'a, T> {
    in_flight: &'a DashMap<String, InFlight<T>>,
    conversation_id: String,
    id: u64,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        // Only remove our own flight; a later one may already own the key.
        self.in_flight
            .remove_if(&self.conversation_id, |_, flight| flight.id == self.id);
    }
}
