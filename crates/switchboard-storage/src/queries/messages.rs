// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations.

use rusqlite::params;
use switchboard_core::{Message, SwitchboardError};

use super::{json_column, parse_column, timestamp};
use crate::database::{Database, map_tr_err};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender, content, channel_type, delivery_status, metadata, created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender: parse_column(row, 2)?,
        content: row.get(3)?,
        channel_type: parse_column(row, 4)?,
        delivery_status: parse_column(row, 5)?,
        metadata: json_column(row, 6)?,
        created_at: parse_column(row, 7)?,
    })
}

/// Insert a new message.
pub async fn insert_message(db: &Database, message: &Message) -> Result<(), SwitchboardError> {
    let metadata = serde_json::to_string(&message.metadata).map_err(|e| {
        SwitchboardError::Storage {
            source: Box::new(e),
        }
    })?;
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender, content, channel_type, \
                 delivery_status, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    m.id,
                    m.conversation_id,
                    m.sender.to_string(),
                    m.content,
                    m.channel_type.to_string(),
                    m.delivery_status.to_string(),
                    metadata,
                    timestamp(&m.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The `limit` most recent messages of a conversation, oldest first.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, SwitchboardError> {
    let id = conversation_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut messages = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![id, limit], message_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;

    messages.reverse();
    Ok(messages)
}
