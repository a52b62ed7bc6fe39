//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed directly to the HTTP
//! layer as a response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swoppa_shared::draft::DraftContent;
use swoppa_shared::listing::{ListingFields, ListingStatus};
use swoppa_shared::moderation::{ReportReason, ReportStatus};
use swoppa_shared::{
    ConversationId, DraftId, FavoriteId, ImageId, ListingId, MessageId, RatingId, ReportId,
    TransactionId, UserId,
};

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The public face of a user attached to other records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    /// `"Unknown User"` when the user has no profile row.
    pub username: String,
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// A listing together with its ordered images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: UserId,
    #[serde(flatten)]
    pub fields: ListingFields,
    pub status: ListingStatus,
    /// Moderator feedback; cleared on resubmission.
    pub rejection_reason: Option<String>,
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the listing was last submitted for review.
    pub published_at: Option<DateTime<Utc>>,
    pub images: Vec<ListingImage>,
}

impl Listing {
    pub fn featured_image(&self) -> Option<&ListingImage> {
        self.images.iter().find(|img| img.is_featured)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingImage {
    pub id: ImageId,
    pub listing_id: ListingId,
    pub url: String,
    pub position: u32,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

/// A pending listing as shown in the moderation queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub owner: UserSummary,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub id: ReportId,
    pub listing_id: ListingId,
    /// Nil for anonymous reports.
    pub reporter_id: UserId,
    pub reason: ReportReason,
    pub details: String,
    pub status: ReportStatus,
    pub resolution_notes: Option<String>,
    pub resolved_by: Option<UserId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An open report enriched for the moderation dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpenReport {
    #[serde(flatten)]
    pub report: Report,
    pub listing_title: String,
    pub listing_status: ListingStatus,
    /// `None` for anonymous reports.
    pub reporter_username: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversations & messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    /// `None` once the listing has been deleted.
    pub listing_id: Option<ListingId>,
    pub participant1: UserId,
    pub participant2: UserId,
    pub created_at: DateTime<Utc>,
    /// Bumped by every new message.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user: UserId) -> bool {
        self.participant1 == user || self.participant2 == user
    }

    /// The counterpart of `user`, who must be a participant.
    pub fn other_participant(&self, user: UserId) -> UserId {
        if self.participant1 == user {
            self.participant2
        } else {
            self.participant1
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingRef {
    pub id: ListingId,
    pub title: String,
    pub status: ListingStatus,
}

/// One row of a user's inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: UserSummary,
    pub listing: ListingRef,
    pub last_message: Option<Message>,
    /// Unread messages addressed to the user the summary was built for.
    pub unread_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Result of a successful send: the message and who should be notified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message: Message,
    pub recipient: UserId,
}

/// Cursor page over a conversation's history, ascending by `created_at`.
///
/// Pass the `created_at` and `id` of the last message already seen. Messages
/// sharing that instant are then continued in insertion order; without
/// `after_id` the whole instant is skipped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePage {
    pub after: Option<DateTime<Utc>>,
    pub after_id: Option<MessageId>,
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteListing {
    pub favorite_id: FavoriteId,
    pub favorited_at: DateTime<Utc>,
    pub listing: Listing,
}

// ---------------------------------------------------------------------------
// Transactions & ratings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    /// `None` once the listing has been deleted.
    pub listing_id: Option<ListingId>,
    pub seller_id: UserId,
    /// Nil when the sale was recorded without a known buyer.
    pub buyer_id: UserId,
    pub status: TransactionStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if self.seller_id == user {
            Some(self.buyer_id)
        } else if self.buyer_id == user {
            Some(self.seller_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rating {
    pub id: RatingId,
    pub transaction_id: TransactionId,
    pub rater_id: UserId,
    pub rated_id: UserId,
    pub communication_rating: u8,
    pub reliability_rating: u8,
    pub overall_rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentRating {
    #[serde(flatten)]
    pub rating: Rating,
    pub rater_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub user_id: UserId,
    pub count: u32,
    /// Averages are 0 when the user has no ratings.
    pub avg_communication: f64,
    pub avg_reliability: f64,
    pub avg_overall: f64,
    pub recent_ratings: Vec<RecentRating>,
}

// ---------------------------------------------------------------------------
// Draft sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingDraft {
    pub id: DraftId,
    pub owner_id: UserId,
    /// The listing being edited, when the session did not start from scratch.
    pub listing_id: Option<ListingId>,
    pub content: DraftContent,
    pub created_at: DateTime<Utc>,
    pub last_saved_at: DateTime<Utc>,
}
