//! Server-held draft sessions for the listing form.
//!
//! A session belongs to one user and optionally points at the listing being
//! edited. Committing turns the saved content into a real listing in one
//! transaction and removes the session.

use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::draft::DraftContent;
use swoppa_shared::listing::{normalize_images, ListingAction, ListingStatus, NewImage};
use swoppa_shared::{DomainError, DraftId, ListingId, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::listings::{
    fetch_listing, insert_listing, mark_published, owned_listing, transition, validate_for_status,
    write_fields, write_images,
};
use crate::models::{Listing, ListingDraft};

const DRAFT_COLUMNS: &str = "id, owner_id, listing_id, content, created_at, last_saved_at";

impl Database {
    /// Start a session, pre-filled from `listing_id` when editing.
    pub fn open_draft(
        &mut self,
        owner: UserId,
        listing_id: Option<ListingId>,
    ) -> Result<ListingDraft> {
        let now = convert::now();
        let tx = self.write_tx()?;

        let content = match listing_id {
            Some(listing_id) => {
                let listing = owned_listing(&tx, listing_id, owner)?;
                listing.status.ensure_editable(listing_id)?;
                let images: Vec<NewImage> = listing
                    .images
                    .iter()
                    .map(|img| NewImage {
                        url: img.url.clone(),
                        is_featured: img.is_featured,
                    })
                    .collect();
                DraftContent::from_listing(&listing.fields, &images)
            }
            None => DraftContent::default(),
        };

        let id = DraftId::new();
        tx.execute(
            "INSERT INTO listing_drafts (id, owner_id, listing_id, content, created_at, last_saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id.to_string(),
                owner.to_string(),
                listing_id.map(|l| l.to_string()),
                serde_json::to_string(&content)?,
                ts(&now),
            ],
        )?;
        let draft = owned_draft(&tx, id, owner)?;
        tx.commit()?;

        tracing::debug!(draft = %id, owner = %owner, "Draft session opened");
        Ok(draft)
    }

    /// Replace the saved form content.
    pub fn save_draft(
        &self,
        id: DraftId,
        owner: UserId,
        content: &DraftContent,
    ) -> Result<ListingDraft> {
        owned_draft(self.conn(), id, owner)?;
        self.conn().execute(
            "UPDATE listing_drafts SET content = ?2, last_saved_at = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                serde_json::to_string(content)?,
                ts(&convert::now())
            ],
        )?;
        owned_draft(self.conn(), id, owner)
    }

    pub fn get_draft(&self, id: DraftId, owner: UserId) -> Result<ListingDraft> {
        owned_draft(self.conn(), id, owner)
    }

    pub fn list_drafts(&self, owner: UserId) -> Result<Vec<ListingDraft>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {DRAFT_COLUMNS} FROM listing_drafts
             WHERE owner_id = ?1
             ORDER BY last_saved_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![owner.to_string()], row_to_draft)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Cancel a session.
    pub fn discard_draft(&self, id: DraftId, owner: UserId) -> Result<()> {
        owned_draft(self.conn(), id, owner)?;
        self.conn().execute(
            "DELETE FROM listing_drafts WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Turn the session into a listing (new or the one being edited),
    /// optionally submitting it for review, and close the session.
    pub fn commit_draft(&mut self, id: DraftId, owner: UserId, submit: bool) -> Result<Listing> {
        let now = convert::now();
        let tx = self.write_tx()?;

        let draft = owned_draft(&tx, id, owner)?;
        let fields = draft.content.to_fields()?;
        let images = normalize_images(draft.content.images())?;

        let listing_id = match draft.listing_id {
            Some(listing_id) => {
                let current = owned_listing(&tx, listing_id, owner)?;
                current.status.ensure_editable(listing_id)?;
                if submit {
                    current.status.apply(ListingAction::Submit)?;
                    fields.validate_for_review()?;
                } else {
                    validate_for_status(&fields, current.status)?;
                }

                write_fields(&tx, listing_id, &fields.normalized(), now)?;
                write_images(&tx, listing_id, &images, now)?;
                if submit {
                    transition(&tx, listing_id, ListingAction::Submit, now)?;
                    mark_published(&tx, listing_id, now)?;
                }
                listing_id
            }
            None => {
                let status = if submit {
                    fields.validate_for_review()?;
                    ListingStatus::Pending
                } else {
                    fields.validate()?;
                    ListingStatus::Draft
                };
                let listing_id = insert_listing(&tx, owner, &fields.normalized(), status, now)?;
                write_images(&tx, listing_id, &images, now)?;
                listing_id
            }
        };

        tx.execute(
            "DELETE FROM listing_drafts WHERE id = ?1",
            params![id.to_string()],
        )?;
        let listing = fetch_listing(&tx, listing_id)?;
        tx.commit()?;

        tracing::info!(
            draft = %id,
            listing = %listing_id,
            status = %listing.status,
            "Draft committed"
        );
        Ok(listing)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn owned_draft(conn: &Connection, id: DraftId, owner: UserId) -> Result<ListingDraft> {
    let draft = conn
        .query_row(
            &format!("SELECT {DRAFT_COLUMNS} FROM listing_drafts WHERE id = ?1"),
            params![id.to_string()],
            row_to_draft,
        )
        .optional()?
        .ok_or_else(|| DomainError::not_found("draft", id))?;

    if draft.owner_id != owner {
        return Err(DomainError::forbidden("draft belongs to another user").into());
    }
    Ok(draft)
}

fn row_to_draft(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListingDraft> {
    let content: String = row.get("content")?;
    let content = serde_json::from_str(&content).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ListingDraft {
        id: convert::id(row, "id")?,
        owner_id: convert::id(row, "owner_id")?,
        listing_id: convert::id_opt(row, "listing_id")?,
        content,
        created_at: convert::time(row, "created_at")?,
        last_saved_at: convert::time(row, "last_saved_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{db_with_active_listing, sample_fields};

    fn complete_content() -> DraftContent {
        let fields = sample_fields();
        DraftContent::from_listing(
            &fields,
            &[
                NewImage {
                    url: "front.jpg".into(),
                    is_featured: false,
                },
                NewImage {
                    url: "back.jpg".into(),
                    is_featured: true,
                },
            ],
        )
    }

    #[test]
    fn save_get_discard() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let draft = db.open_draft(owner, None).unwrap();
        assert_eq!(draft.content, DraftContent::default());

        let content = DraftContent {
            title: Some("Half-written".into()),
            ..Default::default()
        };
        let saved = db.save_draft(draft.id, owner, &content).unwrap();
        assert_eq!(saved.content.title.as_deref(), Some("Half-written"));
        assert!(saved.last_saved_at >= draft.last_saved_at);

        let err = db
            .get_draft(draft.id, UserId::new())
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.code(), "forbidden");

        assert_eq!(db.list_drafts(owner).unwrap().len(), 1);
        db.discard_draft(draft.id, owner).unwrap();
        let err = db.get_draft(draft.id, owner).unwrap_err().to_domain().unwrap();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn commit_creates_and_submits() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let draft = db.open_draft(owner, None).unwrap();
        db.save_draft(draft.id, owner, &complete_content()).unwrap();

        let listing = db.commit_draft(draft.id, owner, true).unwrap();
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.images.len(), 2);
        assert_eq!(listing.featured_image().unwrap().url, "back.jpg");
        assert!(db.list_drafts(owner).unwrap().is_empty());
    }

    #[test]
    fn incomplete_commit_keeps_session() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let draft = db.open_draft(owner, None).unwrap();

        let err = db
            .commit_draft(draft.id, owner, false)
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.field(), Some("title"));
        assert!(db.get_draft(draft.id, owner).is_ok());
        assert!(db.list_own_listings(owner, None).unwrap().is_empty());
    }

    #[test]
    fn edit_session_updates_existing_listing() {
        let (mut db, seller, listing) = db_with_active_listing();

        let draft = db.open_draft(seller, Some(listing.id)).unwrap();
        assert_eq!(draft.content.title.as_deref(), Some(listing.fields.title.as_str()));

        let mut content = draft.content.clone();
        content.title = Some("Armchair, oak".into());
        db.save_draft(draft.id, seller, &content).unwrap();

        let updated = db.commit_draft(draft.id, seller, false).unwrap();
        assert_eq!(updated.id, listing.id);
        assert_eq!(updated.status, ListingStatus::Active);
        assert_eq!(updated.fields.title, "Armchair, oak");

        // Active listings cannot be resubmitted through a session.
        let again = db.open_draft(seller, Some(listing.id)).unwrap();
        let err = db
            .commit_draft(again.id, seller, true)
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn cannot_open_session_on_pending_or_foreign_listing() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let pending = db
            .create_listing(owner, sample_fields(), Vec::new(), false)
            .unwrap();

        let err = db
            .open_draft(owner, Some(pending.id))
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err, DomainError::ListingUnderReview(pending.id));

        let err = db
            .open_draft(UserId::new(), Some(pending.id))
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.code(), "forbidden");
    }
}
