use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::{FavoriteId, ListingId, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::listings::{attach_images, row_to_listing, visible_owner_and_status};
use crate::models::FavoriteListing;

impl Database {
    /// Returns `true` if the favorite was newly added.
    pub fn add_favorite(&mut self, user: UserId, listing: ListingId) -> Result<bool> {
        let tx = self.write_tx()?;
        let added = insert_favorite(&tx, user, listing)?;
        tx.commit()?;
        Ok(added)
    }

    /// Returns `true` if a favorite was removed.
    pub fn remove_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
            params![user.to_string(), listing.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Flip the favorite state and return the new one.
    pub fn toggle_favorite(&mut self, user: UserId, listing: ListingId) -> Result<bool> {
        let tx = self.write_tx()?;
        let now_favorite = if is_favorite(&tx, user, listing)? {
            tx.execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
                params![user.to_string(), listing.to_string()],
            )?;
            false
        } else {
            insert_favorite(&tx, user, listing)?;
            true
        };
        tx.commit()?;
        Ok(now_favorite)
    }

    pub fn is_favorite(&self, user: UserId, listing: ListingId) -> Result<bool> {
        is_favorite(self.conn(), user, listing)
    }

    /// The user's favorites, most recently added first. Favorites on listings
    /// that have since been hidden from the user are left out.
    pub fn list_favorites(&self, user: UserId) -> Result<Vec<FavoriteListing>> {
        let mut stmt = self.conn().prepare(
            "SELECT f.id AS favorite_id, f.created_at AS favorited_at, l.*
             FROM favorites f
             JOIN listings l ON l.id = f.listing_id
             WHERE f.user_id = ?1
               AND (l.status IN ('active', 'sold', 'ended') OR l.owner_id = ?1)
             ORDER BY f.created_at DESC, f.rowid DESC",
        )?;

        let rows = stmt.query_map(params![user.to_string()], |row| {
            Ok(FavoriteListing {
                favorite_id: convert::id(row, "favorite_id")?,
                favorited_at: convert::time(row, "favorited_at")?,
                listing: row_to_listing(row)?,
            })
        })?;

        let mut favorites = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for favorite in favorites.iter_mut() {
            attach_images(self.conn(), std::slice::from_mut(&mut favorite.listing))?;
        }
        Ok(favorites)
    }
}

fn insert_favorite(conn: &Connection, user: UserId, listing: ListingId) -> Result<bool> {
    visible_owner_and_status(conn, listing, Some(user))?;
    let affected = conn.execute(
        "INSERT INTO favorites (id, user_id, listing_id, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (user_id, listing_id) DO NOTHING",
        params![
            FavoriteId::new().to_string(),
            user.to_string(),
            listing.to_string(),
            ts(&convert::now()),
        ],
    )?;
    Ok(affected > 0)
}

fn is_favorite(conn: &Connection, user: UserId, listing: ListingId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
            params![user.to_string(), listing.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
