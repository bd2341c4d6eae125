// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockModel`] - Mock language model with a scripted reply queue
//! - [`RecordingChannel`] - Channel adapter that captures outbound replies
//! - [`InMemoryJobStore`] / [`InMemoryConversationStore`] - Store doubles
//! - [`ManualClock`] - Wall clock advanced by hand
//! - [`TestHarness`] - A full job processor wired to all of the above

pub mod clock;
pub mod harness;
pub mod mock_channel;
pub mod mock_model;
pub mod stores;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_channel::{RecordingChannel, SentReply};
pub use mock_model::{DEFAULT_REPLY, MockCall, MockModel, MockReply};
pub use stores::{InMemoryConversationStore, InMemoryJobStore};
