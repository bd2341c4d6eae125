// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job store trait: the durable queue generation jobs are claimed from.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Job, JobCompletion};

/// Durable, priority-ordered queue of generation jobs.
///
/// Implementations own the concurrency control: a job returned by
/// [`claim_next_job`](JobStore::claim_next_job) must never be handed to a
/// second caller.
#[async_trait]
pub trait JobStore: PluginAdapter {
    /// Atomically move the best pending job to `processing` and return it.
    ///
    /// Highest priority wins; ties go to the earliest `created_at`.
    /// Returns `None` when nothing is pending.
    async fn claim_next_job(&self) -> Result<Option<Job>, SwitchboardError>;

    /// Mark a processing job completed with its outcome.
    async fn complete_job(
        &self,
        job_id: &str,
        completion: &JobCompletion,
    ) -> Result<(), SwitchboardError>;

    /// Mark a processing job failed with an error message.
    async fn fail_job(&self, job_id: &str, error: &str) -> Result<(), SwitchboardError>;
}
