//! The service boundary in front of the store.
//!
//! Every handler goes through [`Marketplace`]. It owns the single database
//! connection, enforces the admin role for moderation, and publishes
//! realtime hints once a write has committed. The database lock is only
//! held inside synchronous sections and never across an `.await`.

use std::sync::Mutex;

use swoppa_shared::constants::UNKNOWN_BUYER;
use swoppa_shared::draft::DraftContent;
use swoppa_shared::events::{listing_topic, MarketEvent};
use swoppa_shared::listing::{ListingFields, ListingPatch, ListingQuery, ListingStatus, NewImage};
use swoppa_shared::moderation::{ReportOutcome, ReportReason};
use swoppa_shared::rating::RatingScores;
use swoppa_shared::{
    ConversationId, DomainError, DraftId, ListingId, ReportId, TransactionId, UserId,
};
use swoppa_store::{
    Conversation, ConversationSummary, Database, FavoriteListing, Listing, ListingDraft, Message,
    MessagePage, OpenReport, PendingListing, Profile, Rating, RatingSummary, Report, Transaction,
};
use tracing::info;

use crate::error::ServerError;
use crate::realtime::EventBus;

type Result<T> = std::result::Result<T, ServerError>;

pub struct Marketplace {
    db: Mutex<Database>,
    events: EventBus,
    recent_ratings_limit: usize,
}

impl Marketplace {
    pub fn new(db: Database, events: EventBus, recent_ratings_limit: usize) -> Self {
        Self {
            db: Mutex::new(db),
            events,
            recent_ratings_limit,
        }
    }

    fn with_db<T>(&self, f: impl FnOnce(&mut Database) -> swoppa_store::Result<T>) -> Result<T> {
        let mut db = self
            .db
            .lock()
            .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
        Ok(f(&mut *db)?)
    }

    fn publish_status(&self, listing: &Listing) {
        self.events.publish(
            &listing_topic(&listing.owner_id),
            MarketEvent::ListingStatusChanged {
                listing_id: listing.id,
                status: listing.status,
            },
        );
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn upsert_profile(
        &self,
        caller: UserId,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<Profile> {
        self.with_db(|db| db.upsert_profile(caller, username, avatar_url))
    }

    pub fn get_profile(&self, user: UserId) -> Result<Profile> {
        self.with_db(|db| db.get_profile(user))
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    pub fn create_listing(
        &self,
        caller: UserId,
        fields: ListingFields,
        images: Vec<NewImage>,
        save_as_draft: bool,
    ) -> Result<Listing> {
        self.with_db(|db| db.create_listing(caller, fields, images, save_as_draft))
    }

    pub fn get_listing(&self, id: ListingId, viewer: Option<UserId>) -> Result<Listing> {
        self.with_db(|db| {
            let viewer_is_admin = match viewer {
                Some(user) => db.is_admin(user)?,
                None => false,
            };
            db.get_listing_for(id, viewer, viewer_is_admin)
        })
    }

    pub fn browse_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        self.with_db(|db| db.browse_listings(query))
    }

    pub fn list_own_listings(
        &self,
        caller: UserId,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>> {
        self.with_db(|db| db.list_own_listings(caller, status))
    }

    pub fn update_listing(
        &self,
        id: ListingId,
        caller: UserId,
        patch: ListingPatch,
    ) -> Result<Listing> {
        self.with_db(|db| db.update_listing(id, caller, patch))
    }

    pub fn replace_images(
        &self,
        id: ListingId,
        caller: UserId,
        images: Vec<NewImage>,
    ) -> Result<Listing> {
        self.with_db(|db| db.replace_images(id, caller, images))
    }

    pub fn submit_listing(&self, id: ListingId, caller: UserId) -> Result<Listing> {
        let listing = self.with_db(|db| db.submit_listing(id, caller))?;
        self.publish_status(&listing);
        Ok(listing)
    }

    pub fn archive_listing(&self, id: ListingId, caller: UserId) -> Result<Listing> {
        let listing = self.with_db(|db| db.archive_listing(id, caller))?;
        self.publish_status(&listing);
        Ok(listing)
    }

    pub fn end_listing(&self, id: ListingId, caller: UserId) -> Result<Listing> {
        let listing = self.with_db(|db| db.end_listing(id, caller))?;
        self.publish_status(&listing);
        Ok(listing)
    }

    pub fn mark_sold(
        &self,
        id: ListingId,
        caller: UserId,
        buyer: Option<UserId>,
    ) -> Result<Transaction> {
        let transaction = self.with_db(|db| db.mark_sold(id, caller, buyer))?;
        let event = MarketEvent::ListingStatusChanged {
            listing_id: id,
            status: ListingStatus::Sold,
        };
        // The buyer learns they can now rate the sale.
        if transaction.buyer_id != UserId(UNKNOWN_BUYER) {
            self.events.publish(&transaction.buyer_id.to_topic(), event.clone());
        }
        self.events.publish(&listing_topic(&caller), event);
        Ok(transaction)
    }

    pub fn delete_listing(&self, id: ListingId, caller: UserId) -> Result<bool> {
        self.with_db(|db| db.delete_listing(id, caller))
    }

    pub fn record_view(&self, id: ListingId) -> Result<bool> {
        self.with_db(|db| db.record_view(id))
    }

    pub fn report_listing(
        &self,
        listing_id: ListingId,
        reporter: Option<UserId>,
        reason: ReportReason,
        details: &str,
    ) -> Result<Report> {
        self.with_db(|db| db.report_listing(listing_id, reporter, reason, details))
    }

    // ------------------------------------------------------------------
    // Moderation (admin role required)
    // ------------------------------------------------------------------

    pub fn list_pending_listings(&self, caller: UserId) -> Result<Vec<PendingListing>> {
        self.with_db(|db| {
            ensure_admin(db, caller)?;
            db.list_pending_listings()
        })
    }

    pub fn approve_listing(&self, caller: UserId, id: ListingId) -> Result<Listing> {
        let listing = self.with_db(|db| {
            ensure_admin(db, caller)?;
            db.approve_listing(id)
        })?;
        info!(listing = %id, admin = %caller, "Listing approved");
        self.publish_status(&listing);
        Ok(listing)
    }

    pub fn reject_listing(&self, caller: UserId, id: ListingId, reason: &str) -> Result<Listing> {
        let listing = self.with_db(|db| {
            ensure_admin(db, caller)?;
            db.reject_listing(id, reason)
        })?;
        info!(listing = %id, admin = %caller, "Listing rejected");
        self.publish_status(&listing);
        Ok(listing)
    }

    pub fn list_open_reports(&self, caller: UserId) -> Result<Vec<OpenReport>> {
        self.with_db(|db| {
            ensure_admin(db, caller)?;
            db.list_open_reports()
        })
    }

    pub fn resolve_report(
        &self,
        caller: UserId,
        id: ReportId,
        outcome: ReportOutcome,
        notes: Option<&str>,
    ) -> Result<Report> {
        self.with_db(|db| {
            ensure_admin(db, caller)?;
            db.resolve_report(id, caller, outcome, notes)
        })
    }

    // ------------------------------------------------------------------
    // Admin role (operator endpoints)
    // ------------------------------------------------------------------

    pub fn grant_admin(&self, user: UserId) -> Result<bool> {
        self.with_db(|db| db.grant_admin(user))
    }

    pub fn revoke_admin(&self, user: UserId) -> Result<bool> {
        self.with_db(|db| db.revoke_admin(user))
    }

    pub fn list_admins(&self) -> Result<Vec<UserId>> {
        self.with_db(|db| db.list_admins())
    }

    /// Grant the role to every configured id. Returns how many were new.
    pub fn seed_admins(&self, users: &[UserId]) -> Result<usize> {
        self.with_db(|db| {
            let mut granted = 0;
            for user in users {
                if db.grant_admin(*user)? {
                    granted += 1;
                }
            }
            Ok(granted)
        })
    }

    // ------------------------------------------------------------------
    // Conversations & messages
    // ------------------------------------------------------------------

    pub fn start_conversation(
        &self,
        listing_id: ListingId,
        caller: UserId,
        other: UserId,
    ) -> Result<Conversation> {
        self.with_db(|db| db.start_or_get_conversation(listing_id, caller, other))
    }

    pub fn list_conversations(&self, caller: UserId) -> Result<Vec<ConversationSummary>> {
        self.with_db(|db| db.list_conversations(caller))
    }

    pub fn delete_conversation(&self, id: ConversationId, caller: UserId) -> Result<()> {
        self.with_db(|db| db.delete_conversation(id, caller))
    }

    /// The realtime topic of a conversation, for participants only.
    pub fn conversation_topic(&self, id: ConversationId, caller: UserId) -> Result<String> {
        let conversation = self.with_db(|db| db.get_conversation(id))?;
        if !conversation.has_participant(caller) {
            return Err(DomainError::forbidden("not a participant of this conversation").into());
        }
        Ok(id.to_topic())
    }

    pub fn send_message(
        &self,
        id: ConversationId,
        sender: UserId,
        content: &str,
    ) -> Result<Message> {
        let sent = self.with_db(|db| db.send_message(id, sender, content))?;

        self.events.publish(
            &id.to_topic(),
            MarketEvent::MessageCreated {
                conversation_id: id,
                message_id: sent.message.id,
                sender_id: sender,
            },
        );
        self.events.publish(
            &sent.recipient.to_topic(),
            MarketEvent::UnreadChanged {
                user_id: sent.recipient,
            },
        );
        Ok(sent.message)
    }

    pub fn list_messages(
        &self,
        id: ConversationId,
        caller: UserId,
        page: Option<MessagePage>,
    ) -> Result<Vec<Message>> {
        self.with_db(|db| db.list_messages(id, caller, page))
    }

    pub fn mark_read(&self, id: ConversationId, reader: UserId) -> Result<u32> {
        let marked = self.with_db(|db| db.mark_read(id, reader))?;
        if marked > 0 {
            self.events.publish(
                &reader.to_topic(),
                MarketEvent::UnreadChanged { user_id: reader },
            );
        }
        Ok(marked)
    }

    pub fn unread_count(&self, user: UserId) -> Result<u32> {
        self.with_db(|db| db.unread_count(user))
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    pub fn add_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        self.with_db(|db| db.add_favorite(user, listing))
    }

    pub fn remove_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        self.with_db(|db| db.remove_favorite(user, listing))
    }

    pub fn toggle_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        self.with_db(|db| db.toggle_favorite(user, listing))
    }

    pub fn is_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        self.with_db(|db| db.is_favorite(user, listing))
    }

    pub fn list_favorites(&self, user: UserId) -> Result<Vec<FavoriteListing>> {
        self.with_db(|db| db.list_favorites(user))
    }

    // ------------------------------------------------------------------
    // Transactions & ratings
    // ------------------------------------------------------------------

    pub fn can_rate(&self, rater: UserId, rated: UserId) -> Result<bool> {
        self.with_db(|db| db.can_rate(rater, rated))
    }

    pub fn submit_rating(
        &self,
        transaction_id: TransactionId,
        rater: UserId,
        rated: UserId,
        scores: RatingScores,
        comment: &str,
    ) -> Result<Rating> {
        self.with_db(|db| db.submit_rating(transaction_id, rater, rated, scores, comment))
    }

    pub fn rating_summary(&self, user: UserId) -> Result<RatingSummary> {
        let limit = self.recent_ratings_limit;
        self.with_db(|db| db.get_user_rating_summary(user, limit))
    }

    pub fn list_transactions(&self, user: UserId) -> Result<Vec<Transaction>> {
        self.with_db(|db| db.list_transactions(user))
    }

    // ------------------------------------------------------------------
    // Draft sessions
    // ------------------------------------------------------------------

    pub fn open_draft(&self, owner: UserId, listing_id: Option<ListingId>) -> Result<ListingDraft> {
        self.with_db(|db| db.open_draft(owner, listing_id))
    }

    pub fn save_draft(
        &self,
        id: DraftId,
        owner: UserId,
        content: &DraftContent,
    ) -> Result<ListingDraft> {
        self.with_db(|db| db.save_draft(id, owner, content))
    }

    pub fn get_draft(&self, id: DraftId, owner: UserId) -> Result<ListingDraft> {
        self.with_db(|db| db.get_draft(id, owner))
    }

    pub fn list_drafts(&self, owner: UserId) -> Result<Vec<ListingDraft>> {
        self.with_db(|db| db.list_drafts(owner))
    }

    pub fn discard_draft(&self, id: DraftId, owner: UserId) -> Result<()> {
        self.with_db(|db| db.discard_draft(id, owner))
    }

    pub fn commit_draft(&self, id: DraftId, owner: UserId, submit: bool) -> Result<Listing> {
        let listing = self.with_db(|db| db.commit_draft(id, owner, submit))?;
        if submit {
            self.publish_status(&listing);
        }
        Ok(listing)
    }
}

/// Admin capability comes from the role table, never from the caller.
fn ensure_admin(db: &Database, caller: UserId) -> swoppa_store::Result<()> {
    if db.is_admin(caller)? {
        Ok(())
    } else {
        Err(DomainError::forbidden("admin role required").into())
    }
}
