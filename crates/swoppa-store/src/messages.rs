use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::constants::{MAX_PAGE_SIZE, MESSAGE_MAX_CHARS};
use swoppa_shared::{ConversationId, DomainError, MessageId, UserId};

use crate::conversations::participant_conversation;
use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Message, MessagePage, SentMessage};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, created_at, read_at";

impl Database {
    /// Append a message and bump the conversation's activity time.
    pub fn send_message(
        &mut self,
        conversation_id: ConversationId,
        sender: UserId,
        content: &str,
    ) -> Result<SentMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::validation("content", "message cannot be empty").into());
        }
        if content.chars().count() > MESSAGE_MAX_CHARS {
            return Err(DomainError::validation(
                "content",
                format!("message exceeds {MESSAGE_MAX_CHARS} characters"),
            )
            .into());
        }

        let now = convert::now();
        let tx = self.write_tx()?;
        let conversation = participant_conversation(&tx, conversation_id, sender)?;

        let message = Message {
            id: MessageId::new(),
            conversation_id,
            sender_id: sender,
            content: content.to_string(),
            created_at: now,
            read_at: None,
        };
        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                conversation_id.to_string(),
                sender.to_string(),
                message.content,
                ts(&now),
            ],
        )?;
        tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![conversation_id.to_string(), ts(&now)],
        )?;
        tx.commit()?;

        tracing::debug!(conversation = %conversation_id, message = %message.id, "Message sent");
        Ok(SentMessage {
            message,
            recipient: conversation.other_participant(sender),
        })
    }

    /// Messages in ascending order. Without a page the full history is
    /// returned.
    pub fn list_messages(
        &self,
        conversation_id: ConversationId,
        caller: UserId,
        page: Option<MessagePage>,
    ) -> Result<Vec<Message>> {
        participant_conversation(self.conn(), conversation_id, caller)?;

        let page = page.unwrap_or_default();
        // SQLite treats a negative LIMIT as unbounded.
        let limit: i64 = page
            .limit
            .map(|l| i64::from(l.clamp(1, MAX_PAGE_SIZE)))
            .unwrap_or(-1);

        // Ties on the cursor instant continue after the cursor message's rowid.
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE conversation_id = ?1
               AND (?2 IS NULL
                    OR created_at > ?2
                    OR (created_at = ?2 AND rowid > COALESCE(
                        (SELECT rowid FROM messages WHERE id = ?4 AND conversation_id = ?1),
                        9223372036854775807)))
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?3"
        ))?;

        let rows = stmt.query_map(
            params![
                conversation_id.to_string(),
                page.after.as_ref().map(ts),
                limit,
                page.after_id.map(|id| id.to_string()),
            ],
            row_to_message,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Mark every unread message addressed to `reader` as read. Returns how
    /// many changed.
    pub fn mark_read(&mut self, conversation_id: ConversationId, reader: UserId) -> Result<u32> {
        let tx = self.write_tx()?;
        participant_conversation(&tx, conversation_id, reader)?;

        let affected = tx.execute(
            "UPDATE messages SET read_at = ?3
             WHERE conversation_id = ?1 AND sender_id != ?2 AND read_at IS NULL",
            params![
                conversation_id.to_string(),
                reader.to_string(),
                ts(&convert::now())
            ],
        )?;
        tx.commit()?;

        Ok(affected as u32)
    }

    /// Total unread messages addressed to `user` across visible conversations.
    pub fn unread_count(&self, user: UserId) -> Result<u32> {
        let count: u32 = self.conn().query_row(
            "SELECT COUNT(*)
             FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE (c.participant1 = ?1 OR c.participant2 = ?1)
               AND c.listing_id IS NOT NULL
               AND m.sender_id != ?1
               AND m.read_at IS NULL",
            params![user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub(crate) fn last_message(conn: &Connection, id: ConversationId) -> Result<Option<Message>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1"
            ),
            params![id.to_string()],
            row_to_message,
        )
        .optional()?)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: convert::id(row, "id")?,
        conversation_id: convert::id(row, "conversation_id")?,
        sender_id: convert::id(row, "sender_id")?,
        content: row.get("content")?,
        created_at: convert::time(row, "created_at")?,
        read_at: convert::time_opt(row, "read_at")?,
    })
}
