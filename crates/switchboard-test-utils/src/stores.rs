// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory job and conversation stores.
//!
//! Same lifecycle rules as the SQLite store, without a database, so engine
//! tests can run under paused time.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::{
    AdapterType, Clock, Conversation, ConversationStore, ConversationUpdate, HealthStatus, Job,
    JobCompletion, JobStatus, JobStore, Message, PluginAdapter, Sender, SwitchboardError,
};

/// Job queue held in a vector.
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
    clock: Arc<dyn Clock>,
    failing_claims: AtomicUsize,
    claim_calls: AtomicUsize,
    stalled_completions: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            clock,
            failing_claims: AtomicUsize::new(0),
            claim_calls: AtomicUsize::new(0),
            stalled_completions: AtomicBool::new(false),
        }
    }

    /// Add a job as pending.
    pub async fn enqueue(&self, mut job: Job) {
        job.status = JobStatus::Pending;
        self.jobs.lock().await.push(job);
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs
            .lock()
            .await
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
    }

    pub async fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().await.clone()
    }

    pub async fn count(&self, status: JobStatus) -> usize {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|j| j.status == status)
            .count()
    }

    /// Make the next `n` claims fail with a storage error.
    pub fn fail_next_claims(&self, n: usize) {
        self.failing_claims.store(n, Ordering::SeqCst);
    }

    /// Make `complete_job` hang until switched back. `fail_job` still works.
    pub fn stall_completions(&self, stall: bool) {
        self.stalled_completions.store(stall, Ordering::SeqCst);
    }

    /// Total `claim_next_job` calls so far.
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    async fn finish(
        &self,
        job_id: &str,
        to: JobStatus,
        apply: impl FnOnce(&mut Job),
    ) -> Result<(), SwitchboardError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| SwitchboardError::NotFound {
                kind: "job",
                id: job_id.to_string(),
            })?;

        if !job.status.can_transition_to(to) {
            return Err(SwitchboardError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status,
                to,
            });
        }
        job.status = to;
        job.completed_at = Some(self.clock.now());
        apply(job);
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for InMemoryJobStore {
    fn name(&self) -> &str {
        "memory-jobs"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::JobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn claim_next_job(&self) -> Result<Option<Job>, SwitchboardError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_claims
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(SwitchboardError::storage("job queue unavailable"));
        }

        let mut jobs = self.jobs.lock().await;
        let next = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| (Reverse(j.priority), j.created_at));

        Ok(next.map(|job| {
            job.status = JobStatus::Processing;
            job.clone()
        }))
    }

    async fn complete_job(
        &self,
        job_id: &str,
        completion: &JobCompletion,
    ) -> Result<(), SwitchboardError> {
        if self.stalled_completions.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.finish(job_id, JobStatus::Completed, |job| {
            job.response = Some(completion.response.clone());
            job.confidence = Some(completion.confidence);
            job.requires_human = Some(completion.requires_human);
            job.processing_time_ms = Some(completion.processing_time_ms);
        })
        .await
    }

    async fn fail_job(&self, job_id: &str, error: &str) -> Result<(), SwitchboardError> {
        self.finish(job_id, JobStatus::Failed, |job| {
            job.error = Some(error.to_string());
        })
        .await
    }
}

/// Conversations and messages held in memory.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    messages: Mutex<Vec<Message>>,
    fail_writes: AtomicBool,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_conversation(&self, conversation: Conversation) {
        self.conversations
            .lock()
            .await
            .insert(conversation.id.clone(), conversation);
    }

    pub async fn conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.conversations.lock().await.get(conversation_id).cloned()
    }

    /// Every message in a conversation, in insertion order.
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Messages the engine wrote for a conversation.
    pub async fn ai_messages(&self, conversation_id: &str) -> Vec<Message> {
        self.messages(conversation_id)
            .await
            .into_iter()
            .filter(|m| m.sender == Sender::Ai)
            .collect()
    }

    /// Make message writes fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for InMemoryConversationStore {
    fn name(&self) -> &str {
        "memory-conversations"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConversationStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, SwitchboardError> {
        Ok(self.conversation(conversation_id).await)
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SwitchboardError> {
        let mut messages = self.messages(conversation_id).await;
        messages.sort_by_key(|m| m.created_at);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    async fn create_message(&self, message: &Message) -> Result<(), SwitchboardError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SwitchboardError::storage("message table is read-only"));
        }
        self.messages.lock().await.push(message.clone());
        Ok(())
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: &ConversationUpdate,
    ) -> Result<(), SwitchboardError> {
        let mut conversations = self.conversations.lock().await;
        let conversation =
            conversations
                .get_mut(conversation_id)
                .ok_or_else(|| SwitchboardError::NotFound {
                    kind: "conversation",
                    id: conversation_id.to_string(),
                })?;
        conversation.apply(update);
        Ok(())
    }
}
