//! Buyer–seller conversations.
//!
//! A conversation is unique per listing and unordered participant pair. The
//! pair is stored twice: as given (`participant1` started it) and sorted
//! (`participant_low`, `participant_high`) so a unique index can enforce the
//! unordered constraint.

use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::listing::ListingStatus;
use swoppa_shared::{ConversationId, DomainError, ListingId, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::listings::visible_owner_and_status;
use crate::messages::last_message;
use crate::models::{Conversation, ConversationSummary, ListingRef};
use crate::profiles::user_summary;

const CONVERSATION_COLUMNS: &str =
    "c.id, c.listing_id, c.participant1, c.participant2, c.created_at, c.updated_at";

impl Database {
    /// Return the conversation between `caller` and `other` about a listing,
    /// creating it if needed.
    ///
    /// An existing conversation is always returned. A new one requires the
    /// listing to be active and one of the two users to own it.
    pub fn start_or_get_conversation(
        &mut self,
        listing_id: ListingId,
        caller: UserId,
        other: UserId,
    ) -> Result<Conversation> {
        if caller == other {
            return Err(DomainError::validation(
                "other_user_id",
                "cannot start a conversation with yourself",
            )
            .into());
        }
        let (low, high) = if caller < other {
            (caller, other)
        } else {
            (other, caller)
        };

        let tx = self.write_tx()?;

        if let Some(existing) = find_by_pair(&tx, listing_id, low, high)? {
            tx.commit()?;
            return Ok(existing);
        }

        let (owner, status) = visible_owner_and_status(&tx, listing_id, Some(caller))?;
        if status != ListingStatus::Active {
            return Err(DomainError::conflict(format!(
                "cannot start a conversation on a listing in status '{status}'"
            ))
            .into());
        }
        if owner != caller && owner != other {
            return Err(DomainError::forbidden(
                "conversations must include the listing owner",
            )
            .into());
        }

        let now = ts(&convert::now());
        let inserted = tx.execute(
            "INSERT INTO conversations
                 (id, listing_id, participant1, participant2, participant_low, participant_high,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (listing_id, participant_low, participant_high) DO NOTHING",
            params![
                ConversationId::new().to_string(),
                listing_id.to_string(),
                caller.to_string(),
                other.to_string(),
                low.to_string(),
                high.to_string(),
                now,
            ],
        )?;

        let conversation = find_by_pair(&tx, listing_id, low, high)?
            .ok_or_else(|| DomainError::conflict("conversation could not be created"))?;
        tx.commit()?;

        if inserted > 0 {
            tracing::info!(
                conversation = %conversation.id,
                listing = %listing_id,
                "Conversation started"
            );
        }
        Ok(conversation)
    }

    pub fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        fetch_conversation(self.conn(), id)
    }

    /// The user's inbox, most recent activity first. Conversations whose
    /// listing was deleted are left out.
    pub fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS},
                    l.title AS listing_title, l.status AS listing_status,
                    (SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = c.id
                       AND m.sender_id != ?1
                       AND m.read_at IS NULL) AS unread_count
             FROM conversations c
             JOIN listings l ON l.id = c.listing_id
             WHERE c.participant1 = ?1 OR c.participant2 = ?1
             ORDER BY c.updated_at DESC, c.rowid DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
            let conversation = row_to_conversation(row)?;
            let listing = ListingRef {
                id: convert::id(row, "listing_id")?,
                title: row.get("listing_title")?,
                status: convert::parsed(row, "listing_status")?,
            };
            let unread: u32 = row.get("unread_count")?;
            Ok((conversation, listing, unread))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (conversation, listing, unread_count) = row?;
            let other_user = user_summary(self.conn(), conversation.other_participant(user))?;
            let last_message = last_message(self.conn(), conversation.id)?;
            summaries.push(ConversationSummary {
                conversation,
                other_user,
                listing,
                last_message,
                unread_count,
            });
        }
        Ok(summaries)
    }

    /// Hard-delete a conversation and its messages. Either participant may
    /// do this.
    pub fn delete_conversation(&mut self, id: ConversationId, caller: UserId) -> Result<()> {
        let tx = self.write_tx()?;
        participant_conversation(&tx, id, caller)?;
        tx.execute(
            "DELETE FROM conversations WHERE id = ?1",
            params![id.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(conversation = %id, "Conversation deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_by_pair(
    conn: &Connection,
    listing_id: ListingId,
    low: UserId,
    high: UserId,
) -> Result<Option<Conversation>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations c
                 WHERE c.listing_id = ?1 AND c.participant_low = ?2 AND c.participant_high = ?3"
            ),
            params![listing_id.to_string(), low.to_string(), high.to_string()],
            row_to_conversation,
        )
        .optional()?)
}

pub(crate) fn fetch_conversation(conn: &Connection, id: ConversationId) -> Result<Conversation> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = ?1"),
        params![id.to_string()],
        row_to_conversation,
    )
    .optional()?
    .ok_or_else(|| DomainError::not_found("conversation", id).into())
}

/// `NotFound` for unknown ids, `Forbidden` unless `user` takes part.
pub(crate) fn participant_conversation(
    conn: &Connection,
    id: ConversationId,
    user: UserId,
) -> Result<Conversation> {
    let conversation = fetch_conversation(conn, id)?;
    if !conversation.has_participant(user) {
        return Err(DomainError::forbidden("not a participant of this conversation").into());
    }
    Ok(conversation)
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: convert::id(row, "id")?,
        listing_id: convert::id_opt(row, "listing_id")?,
        participant1: convert::id(row, "participant1")?,
        participant2: convert::id(row, "participant2")?,
        created_at: convert::time(row, "created_at")?,
        updated_at: convert::time(row, "updated_at")?,
    })
}
