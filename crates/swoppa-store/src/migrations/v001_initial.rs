//! v001 -- Initial schema creation.
//!
//! Creates profiles, the admin role table, listings with their images,
//! reports, conversations and messages.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id         TEXT PRIMARY KEY NOT NULL,     -- user id asserted by the identity provider
    username   TEXT NOT NULL,
    avatar_url TEXT,
    created_at TEXT NOT NULL,                 -- RFC-3339, microsecond precision
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Admin role
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS admins (
    user_id    TEXT PRIMARY KEY NOT NULL,
    granted_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Listings
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS listings (
    id                  TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    owner_id            TEXT NOT NULL,
    title               TEXT NOT NULL,
    description         TEXT NOT NULL,
    category            TEXT NOT NULL,
    condition           TEXT NOT NULL CHECK (condition IN ('new', 'used')),
    listing_type        TEXT NOT NULL CHECK (listing_type IN ('fixed_price', 'auction', 'giveaway')),
    price               TEXT,                       -- decimal string
    auction_start_price TEXT,
    auction_min_price   TEXT,
    auction_end_time    TEXT,
    street              TEXT NOT NULL,
    house_number        TEXT NOT NULL,
    zip                 TEXT NOT NULL,
    city                TEXT NOT NULL,
    canton              TEXT NOT NULL,
    address             TEXT,
    lat                 REAL,
    lng                 REAL,
    allow_trade         INTEGER NOT NULL DEFAULT 0,
    shipping_available  INTEGER NOT NULL DEFAULT 0,
    status              TEXT NOT NULL CHECK (status IN
                            ('draft', 'pending', 'active', 'rejected', 'sold', 'ended', 'inactive')),
    rejection_reason    TEXT,
    view_count          INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    published_at        TEXT
);

CREATE INDEX IF NOT EXISTS idx_listings_status_created ON listings(status, created_at);
CREATE INDEX IF NOT EXISTS idx_listings_owner ON listings(owner_id);

CREATE TABLE IF NOT EXISTS listing_images (
    id          TEXT PRIMARY KEY NOT NULL,
    listing_id  TEXT NOT NULL,
    url         TEXT NOT NULL,
    position    INTEGER NOT NULL,
    is_featured INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,

    FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_listing_images_listing ON listing_images(listing_id, position);

-- ----------------------------------------------------------------
-- Reports
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reports (
    id               TEXT PRIMARY KEY NOT NULL,
    listing_id       TEXT NOT NULL,
    reporter_id      TEXT NOT NULL,             -- nil UUID for anonymous reports
    reason           TEXT NOT NULL,
    details          TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'pending'
                         CHECK (status IN ('pending', 'resolved', 'dismissed')),
    resolution_notes TEXT,
    resolved_by      TEXT,
    resolved_at      TEXT,
    created_at       TEXT NOT NULL,

    FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_reports_status_created ON reports(status, created_at);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id               TEXT PRIMARY KEY NOT NULL,
    listing_id       TEXT,                      -- NULL once the listing is deleted
    participant1     TEXT NOT NULL,
    participant2     TEXT NOT NULL,
    participant_low  TEXT NOT NULL,             -- min(participant1, participant2)
    participant_high TEXT NOT NULL,             -- max(participant1, participant2)
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,

    FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE SET NULL,
    CHECK (participant_low < participant_high)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_pair
    ON conversations(listing_id, participant_low, participant_high);
CREATE INDEX IF NOT EXISTS idx_conversations_p1 ON conversations(participant1);
CREATE INDEX IF NOT EXISTS idx_conversations_p2 ON conversations(participant2);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,
    conversation_id TEXT NOT NULL,
    sender_id       TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    read_at         TEXT,

    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
    ON messages(conversation_id, created_at);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
