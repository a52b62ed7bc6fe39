use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// A user identity as asserted by the identity provider's session token.
    UserId
);
id_type!(ListingId);
id_type!(ImageId);
id_type!(ReportId);
id_type!(
    /// A buyer–seller thread scoped to one listing.
    ConversationId
);
id_type!(MessageId);
id_type!(FavoriteId);
id_type!(TransactionId);
id_type!(RatingId);
id_type!(DraftId);

impl UserId {
    /// The nil id, used for the anonymous reporter and unknown buyer.
    pub fn sentinel() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_sentinel(&self) -> bool {
        self.0.is_nil()
    }

    /// Per-user realtime topic (unread counters).
    pub fn to_topic(&self) -> String {
        format!("user:{}", self.0)
    }
}

impl ConversationId {
    /// Realtime topic carrying message notifications for this conversation.
    pub fn to_topic(&self) -> String {
        format!("conversation:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_namespaced() {
        let user = UserId(Uuid::nil());
        assert_eq!(
            user.to_topic(),
            "user:00000000-0000-0000-0000-000000000000"
        );

        let conv = ConversationId::new();
        assert!(conv.to_topic().starts_with("conversation:"));
        assert!(conv.to_topic().ends_with(&conv.to_string()));
    }

    #[test]
    fn ids_parse_and_serialize_transparently() {
        let id = ListingId::new();
        let parsed: ListingId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn sentinel_user() {
        assert!(UserId::sentinel().is_sentinel());
        assert!(!UserId::new().is_sentinel());
    }
}
