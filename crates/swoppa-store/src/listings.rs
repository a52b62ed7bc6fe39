//! Listing records, images and the status state machine.
//!
//! Every transition re-reads the current status and writes the new one with
//! `UPDATE … WHERE status = <expected>` inside the same write transaction, so
//! a rejected transition never changes anything.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use swoppa_shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, UNKNOWN_BUYER};
use swoppa_shared::listing::{
    haversine_km, normalize_images, ListingAction, ListingFields, ListingKind, ListingPatch,
    ListingQuery, ListingSort, ListingStatus, ListingType, Location, NewImage,
};
use swoppa_shared::{DomainError, ImageId, ListingId, TransactionId, UserId};

use crate::convert::{self, ts};
use crate::database::Database;
use crate::error::Result;
use crate::models::{Listing, ListingImage, Transaction, TransactionStatus};

pub(crate) const LISTING_COLUMNS: &str = "id, owner_id, title, description, category, condition,
     listing_type, price, auction_start_price, auction_min_price, auction_end_time,
     street, house_number, zip, city, canton, address, lat, lng,
     allow_trade, shipping_available, status, rejection_reason, view_count,
     created_at, updated_at, published_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a listing owned by `owner`.
    ///
    /// The listing starts as `draft` when `save_as_draft` is set and goes
    /// straight into moderation (`pending`) otherwise.
    pub fn create_listing(
        &mut self,
        owner: UserId,
        fields: ListingFields,
        images: Vec<NewImage>,
        save_as_draft: bool,
    ) -> Result<Listing> {
        let status = if save_as_draft {
            fields.validate()?;
            ListingStatus::Draft
        } else {
            fields.validate_for_review()?;
            ListingStatus::Pending
        };
        let fields = fields.normalized();
        let images = normalize_images(images)?;
        let now = convert::now();

        let tx = self.write_tx()?;
        let id = insert_listing(&tx, owner, &fields, status, now)?;
        write_images(&tx, id, &images, now)?;
        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;

        tracing::info!(listing = %id, owner = %owner, status = %status, "Listing created");
        Ok(listing)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a listing with its images, regardless of status.
    pub fn get_listing(&self, id: ListingId) -> Result<Listing> {
        fetch_listing(self.conn(), id)
    }

    /// Fetch a listing as seen by `viewer`. Draft, pending, rejected and
    /// archived listings are only visible to their owner and to admins.
    pub fn get_listing_for(
        &self,
        id: ListingId,
        viewer: Option<UserId>,
        viewer_is_admin: bool,
    ) -> Result<Listing> {
        let listing = fetch_listing(self.conn(), id)?;
        let visible = listing.status.is_public()
            || viewer_is_admin
            || viewer.is_some_and(|v| v == listing.owner_id);
        if !visible {
            return Err(DomainError::not_found("listing", id).into());
        }
        Ok(listing)
    }

    /// The caller's own listings, newest first, optionally narrowed to one
    /// status.
    pub fn list_own_listings(
        &self,
        owner: UserId,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {LISTING_COLUMNS}
             FROM listings
             WHERE owner_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(
            params![owner.to_string(), status.map(|s| s.as_str())],
            row_to_listing,
        )?;

        let mut listings = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        attach_images(self.conn(), &mut listings)?;
        Ok(listings)
    }

    /// The public feed: active listings matching `query`.
    pub fn browse_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        let mut clauses = vec!["status = 'active'".to_string()];
        let mut values: Vec<Value> = Vec::new();

        let mut bind = |clauses: &mut Vec<String>, sql: &str, value: Value| {
            values.push(value);
            clauses.push(sql.replace('?', &format!("?{}", values.len())));
        };

        if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            bind(
                &mut clauses,
                "(title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\')",
                Value::Text(pattern),
            );
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            bind(&mut clauses, "category = ?", Value::Text(category.to_string()));
        }
        if let Some(seller) = query.seller {
            bind(&mut clauses, "owner_id = ?", Value::Text(seller.to_string()));
        }
        if let Some(condition) = query.condition {
            bind(&mut clauses, "condition = ?", Value::Text(condition.as_str().into()));
        }
        match query.kind {
            Some(ListingKind::FixedPrice) => clauses.push("listing_type = 'fixed_price'".into()),
            Some(ListingKind::Auction) => clauses.push("listing_type = 'auction'".into()),
            Some(ListingKind::Giveaway) => clauses.push("listing_type = 'giveaway'".into()),
            Some(ListingKind::Trade) => clauses.push("allow_trade = 1".into()),
            None => {}
        }
        if let Some(min) = query.min_price.and_then(|d| d.to_f64()) {
            bind(
                &mut clauses,
                "price IS NOT NULL AND CAST(price AS REAL) >= ?",
                Value::Real(min),
            );
        }
        if let Some(max) = query.max_price.and_then(|d| d.to_f64()) {
            bind(
                &mut clauses,
                "price IS NOT NULL AND CAST(price AS REAL) <= ?",
                Value::Real(max),
            );
        }
        if query.shipping_only {
            clauses.push("shipping_available = 1".into());
        }
        if query.trade_only {
            clauses.push("allow_trade = 1".into());
        }

        let radius = query.radius();
        if radius.is_some() {
            clauses.push("lat IS NOT NULL AND lng IS NOT NULL".into());
        }

        let order = match query.sort {
            ListingSort::Newest => "created_at DESC, rowid DESC",
            ListingSort::Oldest => "created_at ASC, rowid ASC",
            ListingSort::PriceAsc => "price IS NULL, CAST(price AS REAL) ASC, created_at DESC",
            ListingSort::PriceDesc => "price IS NULL, CAST(price AS REAL) DESC, created_at DESC",
        };

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE) as usize;
        let offset = query.offset.unwrap_or(0) as usize;

        // The radius filter runs in Rust, so paging has to follow it.
        let paging = if radius.is_some() {
            String::new()
        } else {
            format!("LIMIT {limit} OFFSET {offset}")
        };

        let sql = format!(
            "SELECT {LISTING_COLUMNS}
             FROM listings
             WHERE {}
             ORDER BY {order}
             {paging}",
            clauses.join(" AND ")
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_listing)?;
        let mut listings = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        if let Some((lat, lng, km)) = radius {
            listings = listings
                .into_iter()
                .filter(|l| {
                    l.fields
                        .location
                        .coordinates()
                        .is_some_and(|c| haversine_km((lat, lng), c) <= km)
                })
                .skip(offset)
                .take(limit)
                .collect();
        }

        attach_images(self.conn(), &mut listings)?;
        Ok(listings)
    }

    /// Count one view. Returns `false` for unknown listings.
    pub fn record_view(&self, id: ListingId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE listings SET view_count = view_count + 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply an owner's content edit. The status never changes here.
    pub fn update_listing(
        &mut self,
        id: ListingId,
        caller: UserId,
        patch: ListingPatch,
    ) -> Result<Listing> {
        let now = convert::now();
        let tx = self.write_tx()?;

        let current = owned_listing(&tx, id, caller)?;
        current.status.ensure_editable(id)?;

        let fields = patch.apply_to(current.fields);
        validate_for_status(&fields, current.status)?;
        write_fields(&tx, id, &fields.normalized(), now)?;

        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;

        tracing::debug!(listing = %id, "Listing updated");
        Ok(listing)
    }

    /// Replace the full image set of a listing.
    pub fn replace_images(
        &mut self,
        id: ListingId,
        caller: UserId,
        images: Vec<NewImage>,
    ) -> Result<Listing> {
        let images = normalize_images(images)?;
        let now = convert::now();
        let tx = self.write_tx()?;

        let current = owned_listing(&tx, id, caller)?;
        current.status.ensure_editable(id)?;

        write_images(&tx, id, &images, now)?;
        touch(&tx, id, now)?;

        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;
        Ok(listing)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// draft | rejected → pending.
    pub fn submit_listing(&mut self, id: ListingId, caller: UserId) -> Result<Listing> {
        let now = convert::now();
        let tx = self.write_tx()?;

        let current = owned_listing(&tx, id, caller)?;
        current.status.apply(ListingAction::Submit)?;
        current.fields.validate_for_review()?;

        transition(&tx, id, ListingAction::Submit, now)?;
        mark_published(&tx, id, now)?;

        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;

        tracing::info!(listing = %id, "Listing submitted for review");
        Ok(listing)
    }

    /// active → sold, recording exactly one completed transaction.
    pub fn mark_sold(
        &mut self,
        id: ListingId,
        caller: UserId,
        buyer: Option<UserId>,
    ) -> Result<Transaction> {
        if buyer == Some(caller) {
            return Err(
                DomainError::validation("buyer_id", "the seller cannot be the buyer").into(),
            );
        }

        let now = convert::now();
        let tx = self.write_tx()?;

        owned_listing(&tx, id, caller)?;
        transition(&tx, id, ListingAction::MarkSold, now)?;

        let transaction = Transaction {
            id: TransactionId::new(),
            listing_id: Some(id),
            seller_id: caller,
            buyer_id: buyer.unwrap_or(UserId(UNKNOWN_BUYER)),
            status: TransactionStatus::Completed,
            completed_at: Some(now),
            created_at: now,
        };
        tx.execute(
            "INSERT INTO transactions (id, listing_id, seller_id, buyer_id, status, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                transaction.id.to_string(),
                id.to_string(),
                transaction.seller_id.to_string(),
                transaction.buyer_id.to_string(),
                transaction.status.as_str(),
                ts(&now),
                ts(&now),
            ],
        )?;
        tx.commit()?;

        tracing::info!(listing = %id, transaction = %transaction.id, "Listing sold");
        Ok(transaction)
    }

    /// active → inactive.
    pub fn archive_listing(&mut self, id: ListingId, caller: UserId) -> Result<Listing> {
        self.owner_transition(id, caller, ListingAction::Archive)
    }

    /// active → ended, auction listings only.
    pub fn end_listing(&mut self, id: ListingId, caller: UserId) -> Result<Listing> {
        self.owner_transition(id, caller, ListingAction::End)
    }

    fn owner_transition(
        &mut self,
        id: ListingId,
        caller: UserId,
        action: ListingAction,
    ) -> Result<Listing> {
        let now = convert::now();
        let tx = self.write_tx()?;

        let current = owned_listing(&tx, id, caller)?;
        if action == ListingAction::End && current.fields.listing_type != ListingType::Auction {
            return Err(DomainError::conflict("only auction listings can be ended").into());
        }
        let status = transition(&tx, id, action, now)?;

        let listing = fetch_listing(&tx, id)?;
        tx.commit()?;

        tracing::info!(listing = %id, status = %status, "Listing status changed");
        Ok(listing)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Hard-delete a listing. Unknown ids are a no-op returning `false`.
    pub fn delete_listing(&mut self, id: ListingId, caller: UserId) -> Result<bool> {
        let tx = self.write_tx()?;

        let Some((owner, status)) = owner_and_status(&tx, id)? else {
            return Ok(false);
        };
        if owner != caller {
            return Err(DomainError::forbidden("only the owner can delete this listing").into());
        }
        status.ensure_deletable(id)?;

        tx.execute("DELETE FROM listings WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;

        tracing::info!(listing = %id, "Listing deleted");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared with moderation and draft sessions
// ---------------------------------------------------------------------------

/// Content checks depend on how far along the listing is: anything that is
/// or was live must stay complete.
pub(crate) fn validate_for_status(
    fields: &ListingFields,
    status: ListingStatus,
) -> std::result::Result<(), DomainError> {
    match status {
        ListingStatus::Active | ListingStatus::Inactive => fields.validate_for_review(),
        _ => fields.validate(),
    }
}

pub(crate) fn insert_listing(
    conn: &Connection,
    owner: UserId,
    fields: &ListingFields,
    status: ListingStatus,
    now: DateTime<Utc>,
) -> Result<ListingId> {
    let id = ListingId::new();
    let published_at = (status == ListingStatus::Pending).then(|| ts(&now));

    conn.execute(
        "INSERT INTO listings (id, owner_id, title, description, category, condition, listing_type,
                               street, house_number, zip, city, canton,
                               status, created_at, updated_at, published_at)
         VALUES (?1, ?2, '', '', '', ?3, ?4, '', '', '', '', '', ?5, ?6, ?6, ?7)",
        params![
            id.to_string(),
            owner.to_string(),
            fields.condition.as_str(),
            fields.listing_type.as_str(),
            status.as_str(),
            ts(&now),
            published_at,
        ],
    )?;
    write_fields(conn, id, fields, now)?;
    Ok(id)
}

pub(crate) fn write_fields(
    conn: &Connection,
    id: ListingId,
    fields: &ListingFields,
    now: DateTime<Utc>,
) -> Result<()> {
    let Location {
        street,
        house_number,
        zip,
        city,
        canton,
        address,
        lat,
        lng,
    } = &fields.location;

    conn.execute(
        "UPDATE listings SET
             title = ?2, description = ?3, category = ?4, condition = ?5, listing_type = ?6,
             price = ?7, auction_start_price = ?8, auction_min_price = ?9, auction_end_time = ?10,
             street = ?11, house_number = ?12, zip = ?13, city = ?14, canton = ?15,
             address = ?16, lat = ?17, lng = ?18,
             allow_trade = ?19, shipping_available = ?20, updated_at = ?21
         WHERE id = ?1",
        params![
            id.to_string(),
            fields.title,
            fields.description,
            fields.category,
            fields.condition.as_str(),
            fields.listing_type.as_str(),
            convert::decimal_text(fields.price),
            convert::decimal_text(fields.auction_start_price),
            convert::decimal_text(fields.auction_min_price),
            fields.auction_end_time.as_ref().map(ts),
            street.trim(),
            house_number.trim(),
            zip,
            city.trim(),
            canton.trim(),
            address.as_deref().map(str::trim),
            lat,
            lng,
            fields.allow_trade,
            fields.shipping_available,
            ts(&now),
        ],
    )?;
    Ok(())
}

/// Replace all images of a listing with an already normalised set.
pub(crate) fn write_images(
    conn: &Connection,
    id: ListingId,
    images: &[NewImage],
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "DELETE FROM listing_images WHERE listing_id = ?1",
        params![id.to_string()],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO listing_images (id, listing_id, url, position, is_featured, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for (position, image) in images.iter().enumerate() {
        stmt.execute(params![
            ImageId::new().to_string(),
            id.to_string(),
            image.url,
            position as u32,
            image.is_featured,
            ts(&now),
        ])?;
    }
    Ok(())
}

/// Move `id` along `action`, failing with `Conflict` when the edge does not
/// exist or the status changed underneath us.
pub(crate) fn transition(
    conn: &Connection,
    id: ListingId,
    action: ListingAction,
    now: DateTime<Utc>,
) -> Result<ListingStatus> {
    let (_, current) =
        owner_and_status(conn, id)?.ok_or_else(|| DomainError::not_found("listing", id))?;
    let next = current.apply(action)?;

    let affected = conn.execute(
        "UPDATE listings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![next.as_str(), ts(&now), id.to_string(), current.as_str()],
    )?;
    if affected == 0 {
        return Err(DomainError::conflict("listing status changed concurrently").into());
    }
    Ok(next)
}

pub(crate) fn mark_published(conn: &Connection, id: ListingId, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE listings SET published_at = ?2, rejection_reason = NULL WHERE id = ?1",
        params![id.to_string(), ts(&now)],
    )?;
    Ok(())
}

fn touch(conn: &Connection, id: ListingId, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE listings SET updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), ts(&now)],
    )?;
    Ok(())
}

pub(crate) fn owner_and_status(
    conn: &Connection,
    id: ListingId,
) -> Result<Option<(UserId, ListingStatus)>> {
    Ok(conn
        .query_row(
            "SELECT owner_id, status FROM listings WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((convert::id(row, "owner_id")?, convert::parsed(row, "status")?)),
        )
        .optional()?)
}

/// Owner and status of a listing `viewer` is allowed to see. Hidden listings
/// read as missing to everyone but their owner.
pub(crate) fn visible_owner_and_status(
    conn: &Connection,
    id: ListingId,
    viewer: Option<UserId>,
) -> Result<(UserId, ListingStatus)> {
    match owner_and_status(conn, id)? {
        Some((owner, status)) if status.is_public() || viewer == Some(owner) => {
            Ok((owner, status))
        }
        _ => Err(DomainError::not_found("listing", id).into()),
    }
}

/// Load a listing the caller owns: `NotFound` when missing, `Forbidden` when
/// owned by someone else.
pub(crate) fn owned_listing(conn: &Connection, id: ListingId, caller: UserId) -> Result<Listing> {
    let listing = fetch_listing(conn, id)?;
    if listing.owner_id != caller {
        return Err(DomainError::forbidden("only the owner can change this listing").into());
    }
    Ok(listing)
}

pub(crate) fn fetch_listing(conn: &Connection, id: ListingId) -> Result<Listing> {
    let listing = conn
        .query_row(
            &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
            params![id.to_string()],
            row_to_listing,
        )
        .optional()?;

    let mut listing = listing.ok_or_else(|| DomainError::not_found("listing", id))?;
    listing.images = load_images(conn, id)?;
    Ok(listing)
}

pub(crate) fn load_images(conn: &Connection, id: ListingId) -> Result<Vec<ListingImage>> {
    let mut stmt = conn.prepare(
        "SELECT id, listing_id, url, position, is_featured, created_at
         FROM listing_images
         WHERE listing_id = ?1
         ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![id.to_string()], |row| {
        Ok(ListingImage {
            id: convert::id(row, "id")?,
            listing_id: convert::id(row, "listing_id")?,
            url: row.get("url")?,
            position: row.get("position")?,
            is_featured: row.get("is_featured")?,
            created_at: convert::time(row, "created_at")?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn attach_images(conn: &Connection, listings: &mut [Listing]) -> Result<()> {
    for listing in listings.iter_mut() {
        listing.images = load_images(conn, listing.id)?;
    }
    Ok(())
}

/// Map a row selected with [`LISTING_COLUMNS`] to a [`Listing`] without
/// images.
pub(crate) fn row_to_listing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Listing> {
    let view_count: i64 = row.get("view_count")?;

    Ok(Listing {
        id: convert::id(row, "id")?,
        owner_id: convert::id(row, "owner_id")?,
        fields: ListingFields {
            title: row.get("title")?,
            description: row.get("description")?,
            category: row.get("category")?,
            condition: convert::parsed(row, "condition")?,
            listing_type: convert::parsed(row, "listing_type")?,
            price: convert::decimal_opt(row, "price")?,
            auction_start_price: convert::decimal_opt(row, "auction_start_price")?,
            auction_min_price: convert::decimal_opt(row, "auction_min_price")?,
            auction_end_time: convert::time_opt(row, "auction_end_time")?,
            location: Location {
                street: row.get("street")?,
                house_number: row.get("house_number")?,
                zip: row.get("zip")?,
                city: row.get("city")?,
                canton: row.get("canton")?,
                address: row.get("address")?,
                lat: row.get("lat")?,
                lng: row.get("lng")?,
            },
            allow_trade: row.get("allow_trade")?,
            shipping_available: row.get("shipping_available")?,
        },
        status: convert::parsed(row, "status")?,
        rejection_reason: row.get("rejection_reason")?,
        view_count: u64::try_from(view_count).unwrap_or(0),
        created_at: convert::time(row, "created_at")?,
        updated_at: convert::time(row, "updated_at")?,
        published_at: convert::time_opt(row, "published_at")?,
        images: Vec::new(),
    })
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::{db_with_active_listing, sample_fields};
    use crate::StoreError;
    use rust_decimal::Decimal;
    use swoppa_shared::listing::Condition;

    fn image(url: &str, is_featured: bool) -> NewImage {
        NewImage {
            url: url.into(),
            is_featured,
        }
    }

    fn domain(err: StoreError) -> DomainError {
        err.to_domain().expect("domain error")
    }

    fn images(urls: &[&str]) -> Vec<NewImage> {
        urls.iter().map(|url| image(url, false)).collect()
    }

    #[test]
    fn create_defaults_to_pending() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();

        let listing = db
            .create_listing(owner, sample_fields(), images(&["a.jpg", "b.jpg"]), false)
            .unwrap();
        assert_eq!(listing.status, ListingStatus::Pending);
        assert!(listing.published_at.is_some());
        assert_eq!(listing.images.len(), 2);
        assert_eq!(listing.featured_image().unwrap().url, "a.jpg");
        assert_eq!(listing.fields.price, Some(Decimal::from(120)));

        let draft = db
            .create_listing(owner, sample_fields(), Vec::new(), true)
            .unwrap();
        assert_eq!(draft.status, ListingStatus::Draft);
        assert!(draft.published_at.is_none());
    }

    #[test]
    fn negative_price_rejected_without_insert() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let mut fields = sample_fields();
        fields.price = Some(Decimal::from(-5));

        let err = domain(db.create_listing(owner, fields, Vec::new(), false).unwrap_err());
        assert_eq!(err.field(), Some("price"));
        assert!(db.list_own_listings(owner, None).unwrap().is_empty());
    }

    #[test]
    fn draft_may_omit_price_but_submit_requires_it() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let mut fields = sample_fields();
        fields.price = None;

        let draft = db.create_listing(owner, fields, Vec::new(), true).unwrap();
        let err = domain(db.submit_listing(draft.id, owner).unwrap_err());
        assert_eq!(err.field(), Some("price"));
        assert_eq!(db.get_listing(draft.id).unwrap().status, ListingStatus::Draft);
    }

    #[test]
    fn edits_respect_review_lock() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let pending = db
            .create_listing(owner, sample_fields(), Vec::new(), false)
            .unwrap();

        let patch = ListingPatch {
            title: Some("Renamed chair".into()),
            ..Default::default()
        };
        let err = domain(db.update_listing(pending.id, owner, patch.clone()).unwrap_err());
        assert_eq!(err, DomainError::ListingUnderReview(pending.id));

        let err = domain(db.delete_listing(pending.id, owner).unwrap_err());
        assert_eq!(err, DomainError::ListingUnderReview(pending.id));

        let err = domain(
            db.replace_images(pending.id, owner, images(&["x.jpg"]))
                .unwrap_err(),
        );
        assert_eq!(err.code(), "listing_under_review");
    }

    #[test]
    fn update_keeps_status_and_checks_owner() {
        let (mut db, seller, listing) = db_with_active_listing();

        let patch = ListingPatch {
            title: Some("Oak armchair".into()),
            condition: Some(Condition::New),
            ..Default::default()
        };
        let err = domain(
            db.update_listing(listing.id, UserId::new(), patch.clone())
                .unwrap_err(),
        );
        assert_eq!(err.code(), "forbidden");

        let updated = db.update_listing(listing.id, seller, patch).unwrap();
        assert_eq!(updated.status, ListingStatus::Active);
        assert_eq!(updated.fields.title, "Oak armchair");
        assert_eq!(updated.fields.condition, Condition::New);

        let err = domain(
            db.update_listing(ListingId::new(), seller, ListingPatch::default())
                .unwrap_err(),
        );
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn active_listing_cannot_drop_price() {
        let (mut db, seller, listing) = db_with_active_listing();
        let patch = ListingPatch {
            price: Some(None),
            ..Default::default()
        };
        let err = domain(db.update_listing(listing.id, seller, patch).unwrap_err());
        assert_eq!(err.field(), Some("price"));
        assert!(db.get_listing(listing.id).unwrap().fields.price.is_some());
    }

    #[test]
    fn invalid_transitions_leave_state_unchanged() {
        let (mut db, seller, listing) = db_with_active_listing();

        let err = domain(db.submit_listing(listing.id, seller).unwrap_err());
        assert_eq!(err.code(), "conflict");

        // Fixed-price listings cannot be ended.
        let err = domain(db.end_listing(listing.id, seller).unwrap_err());
        assert_eq!(err.code(), "conflict");
        assert_eq!(db.get_listing(listing.id).unwrap().status, ListingStatus::Active);

        let archived = db.archive_listing(listing.id, seller).unwrap();
        assert_eq!(archived.status, ListingStatus::Inactive);

        let err = domain(db.mark_sold(listing.id, seller, None).unwrap_err());
        assert_eq!(err.code(), "conflict");
        assert_eq!(db.get_listing(listing.id).unwrap().status, ListingStatus::Inactive);
        assert!(db.list_transactions(seller).unwrap().is_empty());
    }

    #[test]
    fn auction_can_end() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let mut fields = sample_fields();
        fields.listing_type = ListingType::Auction;
        fields.price = None;
        fields.auction_start_price = Some(Decimal::from(10));
        fields.auction_end_time = Some(convert::now() + chrono::Duration::days(7));

        let listing = db.create_listing(owner, fields, Vec::new(), false).unwrap();
        db.approve_listing(listing.id).unwrap();
        let ended = db.end_listing(listing.id, owner).unwrap();
        assert_eq!(ended.status, ListingStatus::Ended);

        let err = domain(db.update_listing(ended.id, owner, ListingPatch::default()).unwrap_err());
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn mark_sold_records_one_transaction() {
        let (mut db, seller, listing) = db_with_active_listing();
        let buyer = UserId::new();

        let err = domain(db.mark_sold(listing.id, buyer, Some(buyer)).unwrap_err());
        assert_eq!(err.field(), Some("buyer_id"));

        let err = domain(db.mark_sold(listing.id, buyer, None).unwrap_err());
        assert_eq!(err.code(), "forbidden");

        let transaction = db.mark_sold(listing.id, seller, Some(buyer)).unwrap();
        assert_eq!(transaction.status, TransactionStatus::Completed);
        assert_eq!(transaction.buyer_id, buyer);
        assert_eq!(db.get_listing(listing.id).unwrap().status, ListingStatus::Sold);

        let err = domain(db.mark_sold(listing.id, seller, Some(buyer)).unwrap_err());
        assert_eq!(err.code(), "conflict");
        assert_eq!(db.list_transactions(seller).unwrap().len(), 1);

        let err = domain(db.delete_listing(listing.id, seller).unwrap_err());
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn unknown_buyer_defaults_to_sentinel() {
        let (mut db, seller, listing) = db_with_active_listing();
        let transaction = db.mark_sold(listing.id, seller, None).unwrap();
        assert!(transaction.buyer_id.is_sentinel());
    }

    #[test]
    fn delete_is_idempotent() {
        let (mut db, seller, listing) = db_with_active_listing();

        let err = domain(db.delete_listing(listing.id, UserId::new()).unwrap_err());
        assert_eq!(err.code(), "forbidden");

        assert!(db.delete_listing(listing.id, seller).unwrap());
        assert!(!db.delete_listing(listing.id, seller).unwrap());
        assert_eq!(domain(db.get_listing(listing.id).unwrap_err()).code(), "not_found");
    }

    #[test]
    fn replace_images_keeps_single_featured() {
        let (mut db, seller, listing) = db_with_active_listing();
        let listing = db
            .replace_images(
                listing.id,
                seller,
                vec![
                    image("1.jpg", false),
                    image("2.jpg", true),
                    image("3.jpg", true),
                ],
            )
            .unwrap();

        let featured: Vec<_> = listing.images.iter().filter(|i| i.is_featured).collect();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].url, "2.jpg");
        assert_eq!(
            listing.images.iter().map(|i| i.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn hidden_states_only_visible_to_owner_and_admin() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        let draft = db
            .create_listing(owner, sample_fields(), Vec::new(), true)
            .unwrap();

        assert!(db.get_listing_for(draft.id, Some(owner), false).is_ok());
        assert!(db.get_listing_for(draft.id, None, true).is_ok());
        let err = domain(db.get_listing_for(draft.id, Some(UserId::new()), false).unwrap_err());
        assert_eq!(err.code(), "not_found");
        assert!(db.get_listing_for(draft.id, None, false).is_err());
    }

    #[test]
    fn browse_filters_and_sorts() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();

        let mut cheap = sample_fields();
        cheap.title = "Cheap lamp".into();
        cheap.price = Some(Decimal::new(950, 2));
        cheap.category = "Lighting".into();

        let mut pricey = sample_fields();
        pricey.title = "Designer sofa".into();
        pricey.price = Some(Decimal::from(900));
        pricey.allow_trade = true;
        // Geneva, far from Bern.
        pricey.location.lat = Some(46.2044);
        pricey.location.lng = Some(6.1432);

        let mut free = sample_fields();
        free.title = "Free moving boxes".into();
        free.listing_type = ListingType::Giveaway;
        free.price = None;
        free.shipping_available = false;

        for fields in [cheap, pricey, free] {
            let listing = db.create_listing(owner, fields, Vec::new(), false).unwrap();
            db.approve_listing(listing.id).unwrap();
        }
        // Pending listings never appear in the feed.
        db.create_listing(owner, sample_fields(), Vec::new(), false)
            .unwrap();

        let all = db.browse_listings(&ListingQuery::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].fields.title, "Free moving boxes");

        let by_price = db
            .browse_listings(&ListingQuery {
                sort: ListingSort::PriceAsc,
                ..Default::default()
            })
            .unwrap();
        let titles: Vec<_> = by_price.iter().map(|l| l.fields.title.as_str()).collect();
        assert_eq!(titles, ["Cheap lamp", "Designer sofa", "Free moving boxes"]);

        let search = db
            .browse_listings(&ListingQuery {
                search: Some("SOFA".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(search.len(), 1);

        let giveaways = db
            .browse_listings(&ListingQuery {
                kind: Some(ListingKind::Giveaway),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(giveaways.len(), 1);

        let trade = db
            .browse_listings(&ListingQuery {
                kind: Some(ListingKind::Trade),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(trade[0].fields.title, "Designer sofa");

        let ranged = db
            .browse_listings(&ListingQuery {
                min_price: Some(Decimal::from(5)),
                max_price: Some(Decimal::from(100)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].fields.title, "Cheap lamp");

        let near_bern = db
            .browse_listings(&ListingQuery {
                lat: Some(46.948),
                lng: Some(7.4474),
                radius_km: Some(20.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(near_bern.len(), 2);

        let shipping = db
            .browse_listings(&ListingQuery {
                shipping_only: true,
                category: Some("Lighting".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(shipping.len(), 1);

        let paged = db
            .browse_listings(&ListingQuery {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].fields.title, "Designer sofa");
    }

    #[test]
    fn like_wildcards_are_literal() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }

    #[test]
    fn own_listings_filter_by_status() {
        let mut db = Database::open_in_memory().unwrap();
        let owner = UserId::new();
        db.create_listing(owner, sample_fields(), Vec::new(), true)
            .unwrap();
        db.create_listing(owner, sample_fields(), Vec::new(), false)
            .unwrap();
        db.create_listing(UserId::new(), sample_fields(), Vec::new(), false)
            .unwrap();

        assert_eq!(db.list_own_listings(owner, None).unwrap().len(), 2);
        assert_eq!(
            db.list_own_listings(owner, Some(ListingStatus::Draft))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn views_are_counted() {
        let (db, _, listing) = db_with_active_listing();
        assert!(db.record_view(listing.id).unwrap());
        assert!(db.record_view(listing.id).unwrap());
        assert!(!db.record_view(ListingId::new()).unwrap());
        assert_eq!(db.get_listing(listing.id).unwrap().view_count, 2);
    }
}
