// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard reply engine.

use thiserror::Error;

use crate::types::JobStatus;

/// The primary error type used across all Switchboard collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (delivery failure, unsupported channel).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Language model service errors (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A claimed job carried a payload that cannot be processed.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// A job status change that the lifecycle does not permit.
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Build a storage error from any displayable failure.
    pub fn storage(message: impl Into<String>) -> Self {
        SwitchboardError::Storage {
            source: message.into().into(),
        }
    }

    /// Whether the failure is expected to clear up on its own.
    ///
    /// Transient failures during generation are absorbed by the fallback reply;
    /// everything else fails the job.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwitchboardError::Provider { .. } | SwitchboardError::Timeout { .. }
        )
    }
}
