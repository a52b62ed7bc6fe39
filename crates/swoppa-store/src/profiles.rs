//! Public user profiles used to enrich conversations, moderation rows and
//! rating summaries.

use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::constants::{UNKNOWN_USERNAME, USERNAME_MAX_CHARS, USERNAME_MIN_CHARS};
use swoppa_shared::{DomainError, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Profile, UserSummary};

impl Database {
    /// Create or update the caller's profile.
    pub fn upsert_profile(
        &self,
        user: UserId,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<Profile> {
        let username = username.trim();
        let len = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
            return Err(DomainError::validation(
                "username",
                format!("must be between {USERNAME_MIN_CHARS} and {USERNAME_MAX_CHARS} characters"),
            )
            .into());
        }
        let avatar_url = avatar_url.map(str::trim).filter(|url| !url.is_empty());
        let now = ts(&convert::now());

        self.conn().execute(
            "INSERT INTO profiles (id, username, avatar_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (id) DO UPDATE SET
                 username = excluded.username,
                 avatar_url = excluded.avatar_url,
                 updated_at = excluded.updated_at",
            params![user.to_string(), username, avatar_url, now],
        )?;

        self.get_profile(user)
    }

    pub fn get_profile(&self, user: UserId) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT id, username, avatar_url, created_at, updated_at
                 FROM profiles WHERE id = ?1",
                params![user.to_string()],
                |row| {
                    Ok(Profile {
                        id: convert::id(row, "id")?,
                        username: row.get("username")?,
                        avatar_url: row.get("avatar_url")?,
                        created_at: convert::time(row, "created_at")?,
                        updated_at: convert::time(row, "updated_at")?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| DomainError::not_found("profile", user).into())
    }
}

/// Display data for `user`, falling back to `"Unknown User"`.
pub(crate) fn user_summary(conn: &Connection, user: UserId) -> Result<UserSummary> {
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT username, avatar_url FROM profiles WHERE id = ?1",
            params![user.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(match row {
        Some((username, avatar_url)) => UserSummary {
            id: user,
            username,
            avatar_url,
        },
        None => UserSummary {
            id: user,
            username: UNKNOWN_USERNAME.to_string(),
            avatar_url: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_update() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::new();

        let created = db.upsert_profile(user, "  lena  ", None).unwrap();
        assert_eq!(created.username, "lena");

        let updated = db
            .upsert_profile(user, "lena_z", Some("https://cdn.example/a.png"))
            .unwrap();
        assert_eq!(updated.username, "lena_z");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.avatar_url.is_some());
    }

    #[test]
    fn username_bounds() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .upsert_profile(UserId::new(), "ab", None)
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.field(), Some("username"));
        assert!(db.upsert_profile(UserId::new(), &"x".repeat(31), None).is_err());
    }

    #[test]
    fn unknown_user_fallback() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::new();

        let err = db.get_profile(user).unwrap_err().to_domain().unwrap();
        assert_eq!(err.code(), "not_found");
        assert_eq!(
            user_summary(db.conn(), user).unwrap().username,
            UNKNOWN_USERNAME
        );
    }
}
