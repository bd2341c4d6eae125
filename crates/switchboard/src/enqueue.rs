// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard enqueue` command implementation.
//!
//! Stands in for channel ingestion: stores the inbound customer message,
//! creating the conversation on first contact, and queues its reply job.

use chrono::Utc;
use switchboard_config::SwitchboardConfig;
use switchboard_core::{
    ChannelType, Conversation, ConversationStore, ConversationUpdate, DeliveryStatus, Job,
    JobContext, Message, MessageMetadata, Sender, SwitchboardError,
};
use switchboard_storage::SqliteStore;

/// One inbound customer message.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub conversation_id: String,
    /// Used only when the conversation does not exist yet.
    pub channel: ChannelType,
    pub priority: i32,
    pub language: Option<String>,
    pub text: String,
}

/// Runs the `switchboard enqueue` command. Returns the queued job id.
pub async fn run_enqueue(
    config: &SwitchboardConfig,
    request: EnqueueRequest,
) -> Result<String, SwitchboardError> {
    let store = SqliteStore::open(config.storage.clone()).await?;
    let result = enqueue(&store, request).await;
    store.close().await?;
    result
}

async fn enqueue(store: &SqliteStore, request: EnqueueRequest) -> Result<String, SwitchboardError> {
    if request.text.trim().is_empty() {
        return Err(SwitchboardError::InvalidJob("message text is empty".into()));
    }
    let now = Utc::now();

    let conversation = match store.get_conversation(&request.conversation_id).await? {
        Some(existing) => existing,
        None => {
            let created = Conversation::new(&request.conversation_id, request.channel, now);
            store.upsert_conversation(&created).await?;
            created
        }
    };
    let channel = conversation.channel_type;

    let message = Message {
        id: format!("msg-{}", uuid::Uuid::new_v4()),
        conversation_id: conversation.id.clone(),
        sender: Sender::Customer,
        content: request.text.clone(),
        channel_type: channel,
        delivery_status: DeliveryStatus::Delivered,
        created_at: now,
        metadata: MessageMetadata::default(),
    };
    store.create_message(&message).await?;
    store
        .update_conversation(
            &conversation.id,
            &ConversationUpdate {
                last_message: message.content.clone(),
                last_activity: now,
                requires_human: false,
                ai_confidence: None,
            },
        )
        .await?;

    let mut context = JobContext::for_channel(channel);
    context.language = request.language;
    let job = Job::pending(
        format!("job-{}", uuid::Uuid::new_v4()),
        &conversation.id,
        &message.id,
        &request.text,
        now,
    )
    .with_priority(request.priority)
    .with_context(&context);
    store.enqueue_job(&job).await?;

    tracing::debug!(job_id = %job.id, conversation_id = %conversation.id, "job enqueued");
    Ok(job.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_config::model::StorageConfig;
    use switchboard_core::JobStatus;

    async fn store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(StorageConfig {
            database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        })
        .await
        .unwrap()
    }

    fn request(conversation: &str, channel: ChannelType, text: &str) -> EnqueueRequest {
        EnqueueRequest {
            conversation_id: conversation.into(),
            channel,
            priority: 2,
            language: Some("de".into()),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn first_message_creates_conversation_and_pending_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let job_id = enqueue(&store, request("c1", ChannelType::Sms, "Hallo"))
            .await
            .unwrap();

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, 2);
        assert_eq!(job.user_message, "Hallo");
        let context = JobContext::from_value(&job.conversation_context).unwrap();
        assert_eq!(context.channel_type, ChannelType::Sms);
        assert_eq!(context.language.as_deref(), Some("de"));

        let conversation = store.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(conversation.channel_type, ChannelType::Sms);
        assert_eq!(conversation.last_message.as_deref(), Some("Hallo"));

        let history = store.recent_messages("c1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, job.message_id);
        assert_eq!(history[0].sender, Sender::Customer);
    }

    #[tokio::test]
    async fn existing_conversation_keeps_its_channel() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        enqueue(&store, request("c1", ChannelType::Email, "first"))
            .await
            .unwrap();
        let job_id = enqueue(&store, request("c1", ChannelType::Widget, "second"))
            .await
            .unwrap();

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        let context = JobContext::from_value(&job.conversation_context).unwrap();
        assert_eq!(context.channel_type, ChannelType::Email);
        assert_eq!(store.job_counts().await.unwrap().pending, 2);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let err = enqueue(&store, request("c1", ChannelType::Sms, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidJob(_)));
        assert!(store.get_conversation("c1").await.unwrap().is_none());
    }
}
