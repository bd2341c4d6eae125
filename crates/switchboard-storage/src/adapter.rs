// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the job store and the conversation store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use switchboard_config::model::StorageConfig;
use switchboard_core::{
    AdapterType, Clock, Conversation, ConversationStore, ConversationUpdate, HealthStatus, Job,
    JobCompletion, JobStatus, JobStore, Message, PluginAdapter, SwitchboardError, SystemClock,
};

use crate::database::Database;
use crate::models::JobCounts;
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened by [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    clock: Arc<dyn Clock>,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new store. The database is not opened until [`initialize`](Self::initialize).
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            db: OnceCell::new(),
        }
    }

    /// Use `clock` for claim and completion timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), SwitchboardError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SwitchboardError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Open and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, SwitchboardError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    /// Returns the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, SwitchboardError> {
        self.db.get().ok_or_else(|| SwitchboardError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    // --- Ingestion ---

    /// Queue a reply job as `pending`.
    pub async fn enqueue_job(&self, job: &Job) -> Result<(), SwitchboardError> {
        if job.status != JobStatus::Pending {
            return Err(SwitchboardError::InvalidJob(format!(
                "job {} must be enqueued as pending, not {}",
                job.id, job.status
            )));
        }
        queries::jobs::insert_job(self.db()?, job).await
    }

    pub async fn upsert_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), SwitchboardError> {
        queries::conversations::upsert_conversation(self.db()?, conversation).await
    }

    // --- Inspection ---

    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>, SwitchboardError> {
        queries::jobs::get_job(self.db()?, job_id).await
    }

    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, SwitchboardError> {
        queries::jobs::list_jobs(self.db()?, status, limit).await
    }

    pub async fn job_counts(&self) -> Result<JobCounts, SwitchboardError> {
        queries::jobs::job_counts(self.db()?).await
    }

    /// Checkpoint the WAL before exit.
    pub async fn close(&self) -> Result<(), SwitchboardError> {
        self.db()?.close().await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::JobStore
    }

    async fn health_check(&self) -> Result<HealthStatus, SwitchboardError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SwitchboardError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn claim_next_job(&self) -> Result<Option<Job>, SwitchboardError> {
        queries::jobs::claim_next_job(self.db()?, self.clock.now()).await
    }

    async fn complete_job(
        &self,
        job_id: &str,
        completion: &JobCompletion,
    ) -> Result<(), SwitchboardError> {
        queries::jobs::complete_job(self.db()?, job_id, completion, self.clock.now()).await
    }

    async fn fail_job(&self, job_id: &str, error: &str) -> Result<(), SwitchboardError> {
        queries::jobs::fail_job(self.db()?, job_id, error, self.clock.now()).await
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, SwitchboardError> {
        queries::conversations::get_conversation(self.db()?, conversation_id).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SwitchboardError> {
        queries::messages::recent_messages(self.db()?, conversation_id, limit).await
    }

    async fn create_message(&self, message: &Message) -> Result<(), SwitchboardError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn update_conversation(
        &self,
        conversation_id: &str,
        update: &ConversationUpdate,
    ) -> Result<(), SwitchboardError> {
        queries::conversations::update_conversation(self.db()?, conversation_id, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, Utc};
    use switchboard_core::{ChannelType, DeliveryStatus, MessageMetadata, Sender};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn health_check_fails_when_not_initialized() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert!(store.health_check().await.is_err());
        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
    }

    #[tokio::test]
    async fn enqueue_rejects_non_pending_jobs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("enqueue.db");
        let store = SqliteStore::open(make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();

        let mut job = Job::pending("j1", "c1", "m1", "hi", Utc::now());
        job.status = JobStatus::Completed;
        assert!(matches!(
            store.enqueue_job(&job).await,
            Err(SwitchboardError::InvalidJob(_))
        ));
    }

    #[tokio::test]
    async fn full_reply_lifecycle_through_traits() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::open(make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();
        // Stored timestamps keep microseconds.
        let now = Utc::now().trunc_subsecs(6);

        store
            .upsert_conversation(&Conversation::new("c1", ChannelType::Widget, now))
            .await
            .unwrap();
        let inbound = Message {
            id: "m1".into(),
            conversation_id: "c1".into(),
            sender: Sender::Customer,
            content: "Is the store open on Sunday?".into(),
            channel_type: ChannelType::Widget,
            delivery_status: DeliveryStatus::Delivered,
            created_at: now,
            metadata: MessageMetadata::default(),
        };
        store.create_message(&inbound).await.unwrap();
        store
            .enqueue_job(&Job::pending("j1", "c1", "m1", &inbound.content, now))
            .await
            .unwrap();

        let job = store.claim_next_job().await.unwrap().unwrap();
        assert_eq!(job.id, "j1");
        assert!(store.claim_next_job().await.unwrap().is_none());

        let history = store.recent_messages("c1", 10).await.unwrap();
        assert_eq!(history, vec![inbound]);

        store
            .complete_job(
                "j1",
                &JobCompletion {
                    response: "Yes, 10am to 4pm.".into(),
                    confidence: 0.85,
                    requires_human: false,
                    processing_time_ms: 300,
                    intent: None,
                    sentiment: None,
                },
            )
            .await
            .unwrap();
        store
            .update_conversation(
                "c1",
                &ConversationUpdate {
                    last_message: "Yes, 10am to 4pm.".into(),
                    last_activity: now,
                    requires_human: false,
                    ai_confidence: Some(0.85),
                },
            )
            .await
            .unwrap();

        let counts = store.job_counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.total(), 1);
        let conversation = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(conversation.message_count, 1);

        store.shutdown().await.unwrap();
    }
}
