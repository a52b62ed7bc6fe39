//! v003 -- Draft sessions for the listing form.

use rusqlite::Connection;

/// SQL executed when upgrading from version 2 to version 3.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS listing_drafts (
    id            TEXT PRIMARY KEY NOT NULL,
    owner_id      TEXT NOT NULL,
    listing_id    TEXT,                         -- set when editing an existing listing
    content       TEXT NOT NULL,                -- JSON form state
    created_at    TEXT NOT NULL,
    last_saved_at TEXT NOT NULL,

    FOREIGN KEY (listing_id) REFERENCES listings(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_listing_drafts_owner ON listing_drafts(owner_id);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
