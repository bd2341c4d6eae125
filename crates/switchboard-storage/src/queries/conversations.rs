// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation aggregate operations.

use rusqlite::{OptionalExtension, params};
use switchboard_core::{Conversation, ConversationUpdate, SwitchboardError};

use super::{json_column, parse_column, timestamp};
use crate::database::{Database, map_tr_err};

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        channel_type: parse_column(row, 1)?,
        priority: parse_column(row, 2)?,
        tags: json_column(row, 3)?,
        requires_human: row.get(4)?,
        ai_confidence: row.get(5)?,
        last_message: row.get(6)?,
        last_activity: parse_column(row, 7)?,
        message_count: row
            .get::<_, i64>(8)
            .map(|n| u64::try_from(n).unwrap_or(0))?,
    })
}

/// Insert a conversation or replace its stored fields.
pub async fn upsert_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), SwitchboardError> {
    let tags = serde_json::to_string(&conversation.tags).map_err(|e| SwitchboardError::Storage {
        source: Box::new(e),
    })?;
    let c = conversation.clone();
    let message_count = i64::try_from(c.message_count).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, channel_type, priority, tags, requires_human, \
                 ai_confidence, last_message, last_activity, message_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(id) DO UPDATE SET channel_type = excluded.channel_type, \
                 priority = excluded.priority, tags = excluded.tags, \
                 requires_human = excluded.requires_human, \
                 ai_confidence = excluded.ai_confidence, last_message = excluded.last_message, \
                 last_activity = excluded.last_activity, message_count = excluded.message_count",
                params![
                    c.id,
                    c.channel_type.to_string(),
                    c.priority.to_string(),
                    tags,
                    c.requires_human,
                    c.ai_confidence,
                    c.last_message,
                    timestamp(&c.last_activity),
                    message_count,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a conversation by id.
pub async fn get_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<Conversation>, SwitchboardError> {
    let id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, channel_type, priority, tags, requires_human, ai_confidence, \
                 last_message, last_activity, message_count \
                 FROM conversations WHERE id = ?1",
                params![id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Fold one appended message into the aggregate in a single statement.
///
/// `last_activity` only moves forward and `requires_human` is OR-ed in.
pub async fn update_conversation(
    db: &Database,
    conversation_id: &str,
    update: &ConversationUpdate,
) -> Result<(), SwitchboardError> {
    let id = conversation_id.to_string();
    let last_message = update.last_message.clone();
    let last_activity = timestamp(&update.last_activity);
    let requires_human = update.requires_human;
    let ai_confidence = update.ai_confidence;

    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_message = ?2, \
                 last_activity = MAX(last_activity, ?3), \
                 message_count = message_count + 1, \
                 requires_human = (requires_human OR ?4), \
                 ai_confidence = COALESCE(?5, ai_confidence) \
                 WHERE id = ?1",
                params![id, last_message, last_activity, requires_human, ai_confidence],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(SwitchboardError::NotFound {
            kind: "conversation",
            id: conversation_id.to_string(),
        });
    }
    Ok(())
}
