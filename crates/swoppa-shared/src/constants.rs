use uuid::Uuid;

/// Application name
pub const APP_NAME: &str = "Swoppa";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Listing title length bounds (characters)
pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 100;

/// Listing description length bounds (characters)
pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Report details length bounds (characters)
pub const REPORT_DETAILS_MIN_CHARS: usize = 10;
pub const REPORT_DETAILS_MAX_CHARS: usize = 1000;

/// Minimum rating comment length (characters)
pub const RATING_COMMENT_MIN_CHARS: usize = 10;

/// Rating score bounds (inclusive)
pub const RATING_SCORE_MIN: u8 = 1;
pub const RATING_SCORE_MAX: u8 = 5;

/// Maximum chat message length after trimming (characters)
pub const MESSAGE_MAX_CHARS: usize = 5000;

/// Username length bounds (characters)
pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 30;

/// Maximum images attached to one listing
pub const MAX_LISTING_IMAGES: usize = 10;

/// Number of recent ratings returned with a rating summary
pub const DEFAULT_RECENT_RATINGS: usize = 5;

/// Page size used when a browse request does not name one
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Page size cap for browse and message paging
pub const MAX_PAGE_SIZE: u32 = 200;

/// Display name used when a participant has no profile row
pub const UNKNOWN_USERNAME: &str = "Unknown User";

/// Reporter id recorded for reports filed without a session
pub const ANONYMOUS_REPORTER: Uuid = Uuid::nil();

/// Buyer id recorded when a listing is sold without a tracked counterpart
pub const UNKNOWN_BUYER: Uuid = Uuid::nil();
