//! Realtime notifications. Payloads are invalidation hints: subscribers
//! re-read authoritative state from the store instead of trusting them.

use serde::{Deserialize, Serialize};

use crate::listing::ListingStatus;
use crate::types::{ConversationId, ListingId, MessageId, UserId};

pub const EVENT_MESSAGE_CREATED: &str = "message-created";
pub const EVENT_UNREAD_CHANGED: &str = "unread-changed";
pub const EVENT_LISTING_STATUS_CHANGED: &str = "listing-status-changed";

/// Topic for moderation-side listing updates of one owner.
pub fn listing_topic(owner: &UserId) -> String {
    owner.to_topic()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarketEvent {
    MessageCreated {
        conversation_id: ConversationId,
        message_id: MessageId,
        sender_id: UserId,
    },
    UnreadChanged {
        user_id: UserId,
    },
    ListingStatusChanged {
        listing_id: ListingId,
        status: ListingStatus,
    },
}

impl MarketEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => EVENT_MESSAGE_CREATED,
            Self::UnreadChanged { .. } => EVENT_UNREAD_CHANGED,
            Self::ListingStatusChanged { .. } => EVENT_LISTING_STATUS_CHANGED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged() {
        let event = MarketEvent::UnreadChanged {
            user_id: UserId::sentinel(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "unread_changed");
        assert_eq!(event.name(), EVENT_UNREAD_CHANGED);

        let status = MarketEvent::ListingStatusChanged {
            listing_id: ListingId::new(),
            status: ListingStatus::Active,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "active");
    }
}
