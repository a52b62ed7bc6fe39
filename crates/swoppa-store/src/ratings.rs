//! The transaction and rating ledger.
//!
//! Transactions are written by [`Database::mark_sold`]; a rating is only
//! accepted from a party of a completed transaction about its counterpart,
//! once per transaction and rater.

use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::constants::UNKNOWN_USERNAME;
use swoppa_shared::rating::{validate_rating_comment, RatingScores};
use swoppa_shared::{DomainError, RatingId, TransactionId, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Rating, RatingSummary, RecentRating, Transaction, TransactionStatus};

const TRANSACTION_COLUMNS: &str =
    "id, listing_id, seller_id, buyer_id, status, completed_at, created_at";

const RATING_COLUMNS: &str = "r.id, r.transaction_id, r.rater_id, r.rated_id,
     r.communication_rating, r.reliability_rating, r.overall_rating, r.comment, r.created_at";

impl Database {
    /// Whether `rater` holds an unused rating right towards `rated`: a
    /// completed transaction between the two that `rater` has not rated yet.
    pub fn can_rate(&self, rater: UserId, rated: UserId) -> Result<bool> {
        if rater == rated || rater.is_sentinel() || rated.is_sentinel() {
            return Ok(false);
        }

        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM transactions t
                 WHERE t.status = 'completed'
                   AND ((t.seller_id = ?1 AND t.buyer_id = ?2)
                     OR (t.seller_id = ?2 AND t.buyer_id = ?1))
                   AND NOT EXISTS (
                       SELECT 1 FROM ratings r
                       WHERE r.transaction_id = t.id AND r.rater_id = ?1)
                 LIMIT 1",
                params![rater.to_string(), rated.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn submit_rating(
        &mut self,
        transaction_id: TransactionId,
        rater: UserId,
        rated: UserId,
        scores: RatingScores,
        comment: &str,
    ) -> Result<Rating> {
        let tx = self.write_tx()?;

        let transaction = fetch_transaction(&tx, transaction_id)?;
        let Some(counterpart) = transaction.counterpart(rater) else {
            return Err(DomainError::forbidden("not a party of this transaction").into());
        };
        if counterpart != rated || rated.is_sentinel() {
            return Err(DomainError::forbidden(
                "ratings can only be given to the transaction counterpart",
            )
            .into());
        }
        if has_rated(&tx, transaction_id, rater)? {
            return Err(DomainError::forbidden("this transaction was already rated").into());
        }

        scores.validate()?;
        let comment = validate_rating_comment(comment)?;

        let rating = Rating {
            id: RatingId::new(),
            transaction_id,
            rater_id: rater,
            rated_id: rated,
            communication_rating: scores.communication,
            reliability_rating: scores.reliability,
            overall_rating: scores.overall,
            comment,
            created_at: convert::now(),
        };
        let inserted = tx.execute(
            "INSERT INTO ratings (id, transaction_id, rater_id, rated_id, communication_rating,
                                  reliability_rating, overall_rating, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                rating.id.to_string(),
                transaction_id.to_string(),
                rater.to_string(),
                rated.to_string(),
                rating.communication_rating,
                rating.reliability_rating,
                rating.overall_rating,
                rating.comment,
                ts(&rating.created_at),
            ],
        );
        match inserted.map_err(crate::StoreError::from) {
            Err(e) if e.is_constraint_violation() => {
                return Err(DomainError::forbidden("this transaction was already rated").into())
            }
            other => other?,
        };
        tx.commit()?;

        tracing::info!(rating = %rating.id, transaction = %transaction_id, "Rating submitted");
        Ok(rating)
    }

    /// Aggregate ratings received by `user` plus the `recent_limit` newest.
    pub fn get_user_rating_summary(
        &self,
        user: UserId,
        recent_limit: usize,
    ) -> Result<RatingSummary> {
        let (count, avg_communication, avg_reliability, avg_overall): (u32, f64, f64, f64) =
            self.conn().query_row(
                "SELECT COUNT(*),
                        COALESCE(AVG(communication_rating), 0.0),
                        COALESCE(AVG(reliability_rating), 0.0),
                        COALESCE(AVG(overall_rating), 0.0)
                 FROM ratings WHERE rated_id = ?1",
                params![user.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {RATING_COLUMNS}, p.username AS rater_username
             FROM ratings r
             LEFT JOIN profiles p ON p.id = r.rater_id
             WHERE r.rated_id = ?1
             ORDER BY r.created_at DESC, r.rowid DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![user.to_string(), recent_limit as i64], |row| {
            let username: Option<String> = row.get("rater_username")?;
            Ok(RecentRating {
                rating: row_to_rating(row)?,
                rater_username: username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            })
        })?;

        Ok(RatingSummary {
            user_id: user,
            count,
            avg_communication,
            avg_reliability,
            avg_overall,
            recent_ratings: rows.collect::<rusqlite::Result<Vec<_>>>()?,
        })
    }

    /// Completed transactions where `user` was seller or buyer, newest first.
    pub fn list_transactions(&self, user: UserId) -> Result<Vec<Transaction>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS}
             FROM transactions
             WHERE (seller_id = ?1 OR buyer_id = ?1) AND status = 'completed'
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user.to_string()], row_to_transaction)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        fetch_transaction(self.conn(), id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fetch_transaction(conn: &Connection, id: TransactionId) -> Result<Transaction> {
    conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id.to_string()],
        row_to_transaction,
    )
    .optional()?
    .ok_or_else(|| DomainError::not_found("transaction", id).into())
}

fn has_rated(conn: &Connection, transaction_id: TransactionId, rater: UserId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM ratings WHERE transaction_id = ?1 AND rater_id = ?2",
            params![transaction_id.to_string(), rater.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: convert::id(row, "id")?,
        listing_id: convert::id_opt(row, "listing_id")?,
        seller_id: convert::id(row, "seller_id")?,
        buyer_id: convert::id(row, "buyer_id")?,
        // Only completed transactions are ever written.
        status: TransactionStatus::Completed,
        completed_at: convert::time_opt(row, "completed_at")?,
        created_at: convert::time(row, "created_at")?,
    })
}

fn row_to_rating(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: convert::id(row, "id")?,
        transaction_id: convert::id(row, "transaction_id")?,
        rater_id: convert::id(row, "rater_id")?,
        rated_id: convert::id(row, "rated_id")?,
        communication_rating: row.get("communication_rating")?,
        reliability_rating: row.get("reliability_rating")?,
        overall_rating: row.get("overall_rating")?,
        comment: row.get("comment")?,
        created_at: convert::time(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::db_with_active_listing;

    const GOOD: RatingScores = RatingScores {
        communication: 5,
        reliability: 4,
        overall: 5,
    };

    fn sold() -> (Database, UserId, UserId, Transaction) {
        let (mut db, seller, listing) = db_with_active_listing();
        let buyer = UserId::new();
        let transaction = db.mark_sold(listing.id, seller, Some(buyer)).unwrap();
        (db, seller, buyer, transaction)
    }

    fn code(err: crate::StoreError) -> &'static str {
        err.to_domain().unwrap().code()
    }

    #[test]
    fn capability_requires_completed_transaction() {
        let (db, seller, buyer, _) = sold();
        assert!(db.can_rate(buyer, seller).unwrap());
        assert!(db.can_rate(seller, buyer).unwrap());
        assert!(!db.can_rate(buyer, UserId::new()).unwrap());
        assert!(!db.can_rate(buyer, buyer).unwrap());
    }

    #[test]
    fn rating_succeeds_exactly_once() {
        let (mut db, seller, buyer, transaction) = sold();

        let rating = db
            .submit_rating(transaction.id, buyer, seller, GOOD, "Friendly and on time")
            .unwrap();
        assert_eq!(rating.rated_id, seller);
        assert!(!db.can_rate(buyer, seller).unwrap());
        // The seller still holds their own right.
        assert!(db.can_rate(seller, buyer).unwrap());

        let err = db
            .submit_rating(transaction.id, buyer, seller, GOOD, "Friendly and on time")
            .unwrap_err();
        assert_eq!(code(err), "forbidden");
    }

    #[test]
    fn outsiders_and_wrong_targets_are_forbidden() {
        let (mut db, seller, buyer, transaction) = sold();

        let err = db
            .submit_rating(transaction.id, UserId::new(), seller, GOOD, "Never met them")
            .unwrap_err();
        assert_eq!(code(err), "forbidden");

        let err = db
            .submit_rating(transaction.id, buyer, UserId::new(), GOOD, "Wrong person here")
            .unwrap_err();
        assert_eq!(code(err), "forbidden");

        let err = db
            .submit_rating(TransactionId::new(), buyer, seller, GOOD, "No such sale at all")
            .unwrap_err();
        assert_eq!(code(err), "not_found");
    }

    #[test]
    fn unknown_buyer_cannot_be_rated() {
        let (mut db, seller, listing) = db_with_active_listing();
        let transaction = db.mark_sold(listing.id, seller, None).unwrap();

        let err = db
            .submit_rating(
                transaction.id,
                seller,
                transaction.buyer_id,
                GOOD,
                "Who was this again?",
            )
            .unwrap_err();
        assert_eq!(code(err), "forbidden");
        assert!(!db.can_rate(seller, transaction.buyer_id).unwrap());
    }

    #[test]
    fn scores_and_comment_are_validated() {
        let (mut db, seller, buyer, transaction) = sold();

        let bad = RatingScores {
            communication: 0,
            ..GOOD
        };
        let err = db
            .submit_rating(transaction.id, buyer, seller, bad, "Friendly and on time")
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.field(), Some("communication_rating"));

        let err = db
            .submit_rating(transaction.id, buyer, seller, GOOD, "ok")
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.field(), Some("comment"));

        // Failed attempts do not consume the right.
        assert!(db.can_rate(buyer, seller).unwrap());
    }

    #[test]
    fn summary_averages_and_recent() {
        let (mut db, seller, listing) = db_with_active_listing();
        let empty = db.get_user_rating_summary(seller, 5).unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.avg_overall, 0.0);
        assert!(empty.recent_ratings.is_empty());

        let buyer = UserId::new();
        db.upsert_profile(buyer, "buyer_ben", None).unwrap();
        let transaction = db.mark_sold(listing.id, seller, Some(buyer)).unwrap();
        db.submit_rating(
            transaction.id,
            buyer,
            seller,
            RatingScores {
                communication: 4,
                reliability: 2,
                overall: 3,
            },
            "Took a while to reply",
        )
        .unwrap();

        let summary = db.get_user_rating_summary(seller, 5).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.avg_communication, 4.0);
        assert_eq!(summary.avg_reliability, 2.0);
        assert_eq!(summary.avg_overall, 3.0);
        assert_eq!(summary.recent_ratings[0].rater_username, "buyer_ben");

        assert!(db
            .get_user_rating_summary(seller, 0)
            .unwrap()
            .recent_ratings
            .is_empty());
    }

    #[test]
    fn transactions_listed_for_both_parties() {
        let (db, seller, buyer, transaction) = sold();
        assert_eq!(db.list_transactions(seller).unwrap()[0].id, transaction.id);
        assert_eq!(db.list_transactions(buyer).unwrap()[0].id, transaction.id);
        assert!(db.list_transactions(UserId::new()).unwrap().is_empty());
        assert_eq!(db.get_transaction(transaction.id).unwrap(), transaction);
    }
}
