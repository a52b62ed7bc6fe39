//! The moderation queue: pending listings, reports and the admin role table.
//!
//! Nothing in here checks who is calling. The admin capability is enforced by
//! the service layer with [`Database::is_admin`] before any of these run.

use rusqlite::{params, Connection, OptionalExtension};
use swoppa_shared::constants::{ANONYMOUS_REPORTER, UNKNOWN_USERNAME};
use swoppa_shared::listing::{ListingAction, ListingStatus};
use swoppa_shared::moderation::{
    validate_rejection_reason, validate_report_details, ReportOutcome, ReportReason, ReportStatus,
};
use swoppa_shared::{DomainError, ListingId, ReportId, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::listings::{
    attach_images, fetch_listing, row_to_listing, transition, visible_owner_and_status,
};
use crate::models::{Listing, OpenReport, PendingListing, Report, UserSummary};

const REPORT_COLUMNS: &str = "r.id, r.listing_id, r.reporter_id, r.reason, r.details, r.status,
     r.resolution_notes, r.resolved_by, r.resolved_at, r.created_at";

impl Database {
    // ------------------------------------------------------------------
    // Listing review
    // ------------------------------------------------------------------

    /// Listings waiting for review, oldest first, with owner and images.
    pub fn list_pending_listings(&self) -> Result<Vec<PendingListing>> {
        let mut stmt = self.conn().prepare(
            "SELECT l.*, p.username AS owner_username, p.avatar_url AS owner_avatar_url
             FROM listings l
             LEFT JOIN profiles p ON p.id = l.owner_id
             WHERE l.status = 'pending'
             ORDER BY l.created_at ASC, l.rowid ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let listing = row_to_listing(row)?;
            let username: Option<String> = row.get("owner_username")?;
            let owner = UserSummary {
                id: listing.owner_id,
                username: username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
                avatar_url: row.get("owner_avatar_url")?,
            };
            Ok(PendingListing { listing, owner })
        })?;

        let mut pending = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        for entry in pending.iter_mut() {
            attach_images(self.conn(), std::slice::from_mut(&mut entry.listing))?;
        }
        Ok(pending)
    }

    /// pending → active.
    pub fn approve_listing(&mut self, id: ListingId) -> Result<Listing> {
        let tx = self.write_tx()?;
        transition(&tx, id, ListingAction::Approve, convert::now())?;
        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;

        tracing::info!(listing = %id, "Listing approved");
        Ok(listing)
    }

    /// pending → rejected with a mandatory reason shown to the owner.
    pub fn reject_listing(&mut self, id: ListingId, reason: &str) -> Result<Listing> {
        let reason = validate_rejection_reason(reason)?;

        let tx = self.write_tx()?;
        transition(&tx, id, ListingAction::Reject, convert::now())?;
        tx.execute(
            "UPDATE listings SET rejection_reason = ?2 WHERE id = ?1",
            params![id.to_string(), reason],
        )?;
        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;

        tracing::info!(listing = %id, "Listing rejected");
        Ok(listing)
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// File a report against a listing. `reporter` is `None` for anonymous
    /// reports.
    pub fn report_listing(
        &mut self,
        listing_id: ListingId,
        reporter: Option<UserId>,
        reason: ReportReason,
        details: &str,
    ) -> Result<Report> {
        let details = validate_report_details(details)?;
        let now = convert::now();

        let tx = self.write_tx()?;
        visible_owner_and_status(&tx, listing_id, reporter)?;

        let id = ReportId::new();
        let reporter = reporter.unwrap_or(UserId(ANONYMOUS_REPORTER));
        tx.execute(
            "INSERT INTO reports (id, listing_id, reporter_id, reason, details, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                listing_id.to_string(),
                reporter.to_string(),
                reason.as_str(),
                details,
                ReportStatus::Pending.as_str(),
                ts(&now),
            ],
        )?;
        let report = fetch_report(&tx, id)?;
        tx.commit()?;

        tracing::info!(
            report = %id,
            listing = %listing_id,
            reason = reason.as_str(),
            "Listing reported"
        );
        Ok(report)
    }

    /// Pending reports, oldest first.
    pub fn list_open_reports(&self) -> Result<Vec<OpenReport>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REPORT_COLUMNS},
                    l.title AS listing_title, l.status AS listing_status,
                    p.username AS reporter_username
             FROM reports r
             JOIN listings l ON l.id = r.listing_id
             LEFT JOIN profiles p ON p.id = r.reporter_id
             WHERE r.status = 'pending'
             ORDER BY r.created_at ASC, r.rowid ASC"
        ))?;

        let rows = stmt.query_map([], |row| {
            let report = row_to_report(row)?;
            let username: Option<String> = row.get("reporter_username")?;
            let reporter_username = (!report.reporter_id.is_sentinel())
                .then(|| username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string()));
            Ok(OpenReport {
                listing_title: row.get("listing_title")?,
                listing_status: convert::parsed::<ListingStatus>(row, "listing_status")?,
                reporter_username,
                report,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Close a pending report. The reported listing is left untouched.
    pub fn resolve_report(
        &mut self,
        id: ReportId,
        resolver: UserId,
        outcome: ReportOutcome,
        notes: Option<&str>,
    ) -> Result<Report> {
        let status = ReportStatus::from(outcome);
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        let now = convert::now();

        let tx = self.write_tx()?;
        let current = fetch_report(&tx, id)?;
        if current.status != ReportStatus::Pending {
            return Err(DomainError::conflict(format!(
                "report is already {}",
                current.status.as_str()
            ))
            .into());
        }

        tx.execute(
            "UPDATE reports
             SET status = ?2, resolution_notes = ?3, resolved_by = ?4, resolved_at = ?5
             WHERE id = ?1 AND status = 'pending'",
            params![
                id.to_string(),
                status.as_str(),
                notes,
                resolver.to_string(),
                ts(&now),
            ],
        )?;
        let report = fetch_report(&tx, id)?;
        tx.commit()?;

        tracing::info!(report = %id, status = status.as_str(), "Report resolved");
        Ok(report)
    }

    pub fn get_report(&self, id: ReportId) -> Result<Report> {
        fetch_report(self.conn(), id)
    }

    // ------------------------------------------------------------------
    // Admin role
    // ------------------------------------------------------------------

    pub fn is_admin(&self, user: UserId) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM admins WHERE user_id = ?1",
                params![user.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Returns `true` if the role was newly granted.
    pub fn grant_admin(&self, user: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT INTO admins (user_id, granted_at) VALUES (?1, ?2)
             ON CONFLICT (user_id) DO NOTHING",
            params![user.to_string(), ts(&convert::now())],
        )?;
        if affected > 0 {
            tracing::info!(user = %user, "Admin role granted");
        }
        Ok(affected > 0)
    }

    /// Returns `true` if the role was held.
    pub fn revoke_admin(&self, user: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM admins WHERE user_id = ?1",
            params![user.to_string()],
        )?;
        if affected > 0 {
            tracing::info!(user = %user, "Admin role revoked");
        }
        Ok(affected > 0)
    }

    pub fn list_admins(&self) -> Result<Vec<UserId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT user_id FROM admins ORDER BY granted_at ASC")?;
        let rows = stmt.query_map([], |row| convert::id(row, "user_id"))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fetch_report(conn: &Connection, id: ReportId) -> Result<Report> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM reports r WHERE r.id = ?1"),
        params![id.to_string()],
        row_to_report,
    )
    .optional()?
    .ok_or_else(|| DomainError::not_found("report", id).into())
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: convert::id(row, "id")?,
        listing_id: convert::id(row, "listing_id")?,
        reporter_id: convert::id(row, "reporter_id")?,
        reason: convert::parsed(row, "reason")?,
        details: row.get("details")?,
        status: convert::parsed(row, "status")?,
        resolution_notes: row.get("resolution_notes")?,
        resolved_by: convert::id_opt(row, "resolved_by")?,
        resolved_at: convert::time_opt(row, "resolved_at")?,
        created_at: convert::time(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{db_with_active_listing, sample_fields};

    fn pending_listing(db: &mut Database) -> (UserId, Listing) {
        let owner = UserId::new();
        let listing = db
            .create_listing(owner, sample_fields(), Vec::new(), false)
            .unwrap();
        (owner, listing)
    }

    #[test]
    fn approve_only_from_pending() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let draft = db
            .create_listing(owner, sample_fields(), Vec::new(), true)
            .unwrap();

        let err = db.approve_listing(draft.id).unwrap_err().to_domain().unwrap();
        assert_eq!(err.code(), "conflict");
        assert_eq!(db.get_listing(draft.id).unwrap().status, ListingStatus::Draft);

        let err = db
            .approve_listing(ListingId::new())
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.code(), "not_found");

        let (_, pending) = pending_listing(&mut db);
        let approved = db.approve_listing(pending.id).unwrap();
        assert_eq!(approved.status, ListingStatus::Active);
    }

    #[test]
    fn reject_requires_reason() {
        let mut db = Database::open_in_memory().unwrap();
        let (owner, listing) = pending_listing(&mut db);

        let err = db
            .reject_listing(listing.id, "   ")
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.field(), Some("reason"));
        assert_eq!(db.get_listing(listing.id).unwrap().status, ListingStatus::Pending);

        let rejected = db.reject_listing(listing.id, "Photos are blurry").unwrap();
        assert_eq!(rejected.status, ListingStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Photos are blurry"));

        // Resubmission clears the reason.
        let resubmitted = db.submit_listing(listing.id, owner).unwrap();
        assert_eq!(resubmitted.status, ListingStatus::Pending);
        assert!(resubmitted.rejection_reason.is_none());
    }

    #[test]
    fn pending_queue_in_insertion_order_with_owner() {
        let mut db = Database::open_in_memory().unwrap();
        let (first_owner, first) = pending_listing(&mut db);
        let (_, second) = pending_listing(&mut db);
        db.upsert_profile(first_owner, "anna_b", None).unwrap();

        let queue = db.list_pending_listings().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].listing.id, first.id);
        assert_eq!(queue[0].owner.username, "anna_b");
        assert_eq!(queue[1].listing.id, second.id);
        assert_eq!(queue[1].owner.username, UNKNOWN_USERNAME);
    }

    #[test]
    fn reports_flow() {
        let (mut db, _, listing) = db_with_active_listing();
        let reporter = UserId::new();
        db.upsert_profile(reporter, "watchful", None).unwrap();

        let err = db
            .report_listing(ListingId::new(), None, ReportReason::Scam, "This looks fake to me")
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.code(), "not_found");

        let err = db
            .report_listing(listing.id, None, ReportReason::Scam, "fake")
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.field(), Some("details"));

        let anonymous = db
            .report_listing(listing.id, None, ReportReason::Misleading, "Wrong dimensions given")
            .unwrap();
        assert!(anonymous.reporter_id.is_sentinel());
        let named = db
            .report_listing(
                listing.id,
                Some(reporter),
                ReportReason::Counterfeit,
                "Not an original piece",
            )
            .unwrap();

        let open = db.list_open_reports().unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].report.id, anonymous.id);
        assert_eq!(open[0].reporter_username, None);
        assert_eq!(open[1].reporter_username.as_deref(), Some("watchful"));
        assert_eq!(open[1].listing_status, ListingStatus::Active);

        let admin = UserId::new();
        let resolved = db
            .resolve_report(named.id, admin, ReportOutcome::Dismissed, Some(" checked "))
            .unwrap();
        assert_eq!(resolved.status, ReportStatus::Dismissed);
        assert_eq!(resolved.resolved_by, Some(admin));
        assert_eq!(resolved.resolution_notes.as_deref(), Some("checked"));

        let err = db
            .resolve_report(named.id, admin, ReportOutcome::Resolved, None)
            .unwrap_err()
            .to_domain()
            .unwrap();
        assert_eq!(err.code(), "conflict");

        assert_eq!(db.list_open_reports().unwrap().len(), 1);
        // Resolving never touches the listing.
        assert_eq!(db.get_listing(listing.id).unwrap().status, ListingStatus::Active);
    }

    #[test]
    fn admin_role_table() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::new();

        assert!(!db.is_admin(user).unwrap());
        assert!(db.grant_admin(user).unwrap());
        assert!(!db.grant_admin(user).unwrap());
        assert!(db.is_admin(user).unwrap());
        assert_eq!(db.list_admins().unwrap(), vec![user]);

        assert!(db.revoke_admin(user).unwrap());
        assert!(!db.revoke_admin(user).unwrap());
        assert!(!db.is_admin(user).unwrap());
    }

    #[test]
    fn hidden_listings_cannot_be_reported_by_others() {
        let mut db = Database::open_in_memory().unwrap();
        let (owner, pending) = pending_listing(&mut db);

        for reporter in [None, Some(UserId::new())] {
            let err = db
                .report_listing(pending.id, reporter, ReportReason::Scam, "Seen this elsewhere")
                .unwrap_err()
                .to_domain()
                .unwrap();
            assert_eq!(err.code(), "not_found");
        }
        assert!(db.list_open_reports().unwrap().is_empty());

        assert!(db
            .report_listing(pending.id, Some(owner), ReportReason::Other, "Posted by mistake")
            .is_ok());
    }
}
