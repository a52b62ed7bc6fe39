//! v002 -- Favorites, transactions and ratings.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS favorites (
    id         TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    listing_id TEXT NOT NULL,
    created_at TEXT NOT NULL,

    UNIQUE (user_id, listing_id),
    FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS transactions (
    id           TEXT PRIMARY KEY NOT NULL,
    listing_id   TEXT,                          -- NULL once the listing is deleted
    seller_id    TEXT NOT NULL,
    buyer_id     TEXT NOT NULL,                 -- nil UUID when the buyer is unknown
    status       TEXT NOT NULL DEFAULT 'completed',
    completed_at TEXT,
    created_at   TEXT NOT NULL,

    FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_seller ON transactions(seller_id);
CREATE INDEX IF NOT EXISTS idx_transactions_buyer ON transactions(buyer_id);

CREATE TABLE IF NOT EXISTS ratings (
    id                   TEXT PRIMARY KEY NOT NULL,
    transaction_id       TEXT NOT NULL,
    rater_id             TEXT NOT NULL,
    rated_id             TEXT NOT NULL,
    communication_rating INTEGER NOT NULL CHECK (communication_rating BETWEEN 1 AND 5),
    reliability_rating   INTEGER NOT NULL CHECK (reliability_rating BETWEEN 1 AND 5),
    overall_rating       INTEGER NOT NULL CHECK (overall_rating BETWEEN 1 AND 5),
    comment              TEXT NOT NULL,
    created_at           TEXT NOT NULL,

    UNIQUE (transaction_id, rater_id),
    FOREIGN KEY (transaction_id) REFERENCES transactions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_ratings_rated ON ratings(rated_id, created_at);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
