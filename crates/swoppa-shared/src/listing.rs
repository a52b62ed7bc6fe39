//! Listing vocabulary: the status state machine, listing fields and their
//! validation rules, image normalisation and browse queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    DESCRIPTION_MAX_CHARS, DESCRIPTION_MIN_CHARS, MAX_LISTING_IMAGES, TITLE_MAX_CHARS,
    TITLE_MIN_CHARS,
};
use crate::error::{DomainError, DomainResult};
use crate::types::{ListingId, UserId};

// ---------------------------------------------------------------------------
// Status state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Pending,
    Active,
    Rejected,
    Sold,
    Ended,
    /// Archived by the owner.
    Inactive,
}

/// Everything that can move a listing between states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingAction {
    Submit,
    Approve,
    Reject,
    MarkSold,
    Archive,
    End,
}

impl ListingStatus {
    pub const ALL: [ListingStatus; 7] = [
        Self::Draft,
        Self::Pending,
        Self::Active,
        Self::Rejected,
        Self::Sold,
        Self::Ended,
        Self::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Sold => "sold",
            Self::Ended => "ended",
            Self::Inactive => "inactive",
        }
    }

    /// Target state for `action`, or `Conflict` when the edge does not exist.
    pub fn apply(self, action: ListingAction) -> DomainResult<ListingStatus> {
        use ListingAction::*;
        use ListingStatus::*;

        match (self, action) {
            (Draft, Submit) | (Rejected, Submit) => Ok(Pending),
            (Pending, Approve) => Ok(Active),
            (Pending, Reject) => Ok(Rejected),
            (Active, MarkSold) => Ok(Sold),
            (Active, Archive) => Ok(Inactive),
            (Active, End) => Ok(Ended),
            (from, action) => Err(DomainError::conflict(format!(
                "cannot {} a listing in status '{}'",
                action.verb(),
                from.as_str()
            ))),
        }
    }

    /// Content edits are refused while a listing is under review and once it
    /// reached a terminal trade state.
    pub fn ensure_editable(self, id: ListingId) -> DomainResult<()> {
        match self {
            Self::Pending => Err(DomainError::ListingUnderReview(id)),
            Self::Sold | Self::Ended => Err(DomainError::conflict(format!(
                "listing in status '{}' can no longer be edited",
                self.as_str()
            ))),
            _ => Ok(()),
        }
    }

    pub fn ensure_deletable(self, id: ListingId) -> DomainResult<()> {
        match self {
            Self::Pending => Err(DomainError::ListingUnderReview(id)),
            Self::Sold => Err(DomainError::conflict(
                "sold listings are kept for the transaction record",
            )),
            _ => Ok(()),
        }
    }

    /// Whether anyone (not only owner/admin) may see the listing.
    pub fn is_public(self) -> bool {
        matches!(self, Self::Active | Self::Sold | Self::Ended)
    }
}

impl ListingAction {
    fn verb(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::MarkSold => "mark as sold",
            Self::Archive => "archive",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation("status", format!("unknown status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Listing fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Used,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
        }
    }
}

impl std::str::FromStr for Condition {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "used" => Ok(Self::Used),
            other => Err(DomainError::validation(
                "condition",
                format!("unknown condition '{other}'"),
            )),
        }
    }
}

/// How the item is offered. Giveaways are first-class and never carry a price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    #[default]
    FixedPrice,
    Auction,
    Giveaway,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedPrice => "fixed_price",
            Self::Auction => "auction",
            Self::Giveaway => "giveaway",
        }
    }
}

impl std::str::FromStr for ListingType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_price" => Ok(Self::FixedPrice),
            "auction" => Ok(Self::Auction),
            "giveaway" => Ok(Self::Giveaway),
            other => Err(DomainError::validation(
                "listing_type",
                format!("unknown listing type '{other}'"),
            )),
        }
    }
}

/// Structured pickup address. Coordinates come from the caller's geocoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Location {
    pub street: String,
    pub house_number: String,
    pub zip: String,
    pub city: String,
    pub canton: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl Location {
    pub fn validate(&self) -> DomainResult<()> {
        require_non_empty("location.street", &self.street)?;
        require_non_empty("location.house_number", &self.house_number)?;
        if !is_valid_zip(&self.zip) {
            return Err(DomainError::validation(
                "location.zip",
                "postal code must be 4 digits and not start with 0",
            ));
        }
        require_non_empty("location.city", &self.city)?;
        require_non_empty("location.canton", &self.canton)?;

        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err(DomainError::validation(
                        "location.lat",
                        "coordinates out of range",
                    ));
                }
            }
            (None, None) => {}
            _ => {
                return Err(DomainError::validation(
                    "location.lat",
                    "latitude and longitude must be given together",
                ))
            }
        }
        Ok(())
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

/// The owner-editable content of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub condition: Condition,
    #[serde(default)]
    pub listing_type: ListingType,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub auction_start_price: Option<Decimal>,
    #[serde(default)]
    pub auction_min_price: Option<Decimal>,
    #[serde(default)]
    pub auction_end_time: Option<DateTime<Utc>>,
    pub location: Location,
    #[serde(default)]
    pub allow_trade: bool,
    #[serde(default)]
    pub shipping_available: bool,
}

impl ListingFields {
    /// Field-level checks applied on every create and update.
    pub fn validate(&self) -> DomainResult<()> {
        let title_len = self.title.trim().chars().count();
        if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
            return Err(DomainError::validation(
                "title",
                format!("must be between {TITLE_MIN_CHARS} and {TITLE_MAX_CHARS} characters"),
            ));
        }

        let description_len = self.description.trim().chars().count();
        if !(DESCRIPTION_MIN_CHARS..=DESCRIPTION_MAX_CHARS).contains(&description_len) {
            return Err(DomainError::validation(
                "description",
                format!(
                    "must be between {DESCRIPTION_MIN_CHARS} and {DESCRIPTION_MAX_CHARS} characters"
                ),
            ));
        }

        require_non_empty("category", &self.category)?;

        require_non_negative("price", self.price)?;
        require_non_negative("auction_start_price", self.auction_start_price)?;
        require_non_negative("auction_min_price", self.auction_min_price)?;

        if self.listing_type == ListingType::Giveaway
            && self.price.is_some_and(|price| !price.is_zero())
        {
            return Err(DomainError::validation(
                "price",
                "giveaway listings carry no price",
            ));
        }

        self.location.validate()
    }

    /// Stricter checks applied when the listing enters moderation.
    pub fn validate_for_review(&self) -> DomainResult<()> {
        self.validate()?;
        match self.listing_type {
            ListingType::FixedPrice if self.price.is_none() => Err(DomainError::validation(
                "price",
                "a price is required for fixed-price listings",
            )),
            ListingType::Auction if self.auction_start_price.is_none() => Err(
                DomainError::validation("auction_start_price", "a start price is required"),
            ),
            ListingType::Auction if self.auction_end_time.is_none() => Err(
                DomainError::validation("auction_end_time", "an end time is required"),
            ),
            _ => Ok(()),
        }
    }

    /// Trim free text and drop a zero price on giveaways.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.category = self.category.trim().to_string();
        if self.listing_type == ListingType::Giveaway {
            self.price = None;
        }
        self
    }
}

/// Partial update of [`ListingFields`]; absent members stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<Condition>,
    pub listing_type: Option<ListingType>,
    /// `Some(None)` clears the price.
    #[serde(default, deserialize_with = "double_option")]
    pub price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub auction_start_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub auction_min_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub auction_end_time: Option<Option<DateTime<Utc>>>,
    pub location: Option<Location>,
    pub allow_trade: Option<bool>,
    pub shipping_available: Option<bool>,
}

impl ListingPatch {
    pub fn apply_to(self, mut fields: ListingFields) -> ListingFields {
        if let Some(v) = self.title {
            fields.title = v;
        }
        if let Some(v) = self.description {
            fields.description = v;
        }
        if let Some(v) = self.category {
            fields.category = v;
        }
        if let Some(v) = self.condition {
            fields.condition = v;
        }
        if let Some(v) = self.listing_type {
            fields.listing_type = v;
        }
        if let Some(v) = self.price {
            fields.price = v;
        }
        if let Some(v) = self.auction_start_price {
            fields.auction_start_price = v;
        }
        if let Some(v) = self.auction_min_price {
            fields.auction_min_price = v;
        }
        if let Some(v) = self.auction_end_time {
            fields.auction_end_time = v;
        }
        if let Some(v) = self.location {
            fields.location = v;
        }
        if let Some(v) = self.allow_trade {
            fields.allow_trade = v;
        }
        if let Some(v) = self.shipping_available {
            fields.shipping_available = v;
        }
        fields
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn require_non_empty(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "is required"));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Option<Decimal>) -> DomainResult<()> {
    if value.is_some_and(|v| v < Decimal::ZERO) {
        return Err(DomainError::validation(field, "must not be negative"));
    }
    Ok(())
}

/// Swiss postal codes: four digits, first one non-zero.
pub fn is_valid_zip(zip: &str) -> bool {
    let bytes = zip.as_bytes();
    bytes.len() == 4 && bytes[0] != b'0' && bytes.iter().all(u8::is_ascii_digit)
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewImage {
    pub url: String,
    #[serde(default)]
    pub is_featured: bool,
}

/// Positions images and guarantees exactly one featured entry when any exist.
pub fn normalize_images(images: Vec<NewImage>) -> DomainResult<Vec<NewImage>> {
    if images.len() > MAX_LISTING_IMAGES {
        return Err(DomainError::validation(
            "images",
            format!("at most {MAX_LISTING_IMAGES} images per listing"),
        ));
    }
    if images.iter().any(|img| img.url.trim().is_empty()) {
        return Err(DomainError::validation("images", "image url is required"));
    }

    let featured = images.iter().position(|img| img.is_featured).unwrap_or(0);
    Ok(images
        .into_iter()
        .enumerate()
        .map(|(i, img)| NewImage {
            url: img.url.trim().to_string(),
            is_featured: i == featured,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Browse queries
// ---------------------------------------------------------------------------

/// Listing feed segments from the public pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    FixedPrice,
    Auction,
    Giveaway,
    Trade,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingSort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub seller: Option<UserId>,
    pub kind: Option<ListingKind>,
    pub condition: Option<Condition>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub shipping_only: bool,
    #[serde(default)]
    pub trade_only: bool,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub sort: ListingSort,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListingQuery {
    /// Centre and radius when a complete radius filter was requested.
    pub fn radius(&self) -> Option<(f64, f64, f64)> {
        match (self.lat, self.lng, self.radius_km) {
            (Some(lat), Some(lng), Some(km)) if km > 0.0 => Some((lat, lng, km)),
            _ => None,
        }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn image(url: &str, is_featured: bool) -> NewImage {
        NewImage {
            url: url.into(),
            is_featured,
        }
    }

    pub(crate) fn sample_fields() -> ListingFields {
        ListingFields {
            title: "Mountain bike".into(),
            description: "Barely used, 21 gears, new tyres.".into(),
            category: "Sport".into(),
            condition: Condition::Used,
            listing_type: ListingType::FixedPrice,
            price: Some(Decimal::from(250)),
            auction_start_price: None,
            auction_min_price: None,
            auction_end_time: None,
            location: Location {
                street: "Bahnhofstrasse".into(),
                house_number: "1".into(),
                zip: "8001".into(),
                city: "Zürich".into(),
                canton: "ZH".into(),
                address: None,
                lat: Some(47.3769),
                lng: Some(8.5417),
            },
            allow_trade: true,
            shipping_available: false,
        }
    }

    #[test]
    fn only_enumerated_edges_are_allowed() {
        use ListingAction::*;
        use ListingStatus::*;

        let allowed = [
            (Draft, Submit, Pending),
            (Rejected, Submit, Pending),
            (Pending, Approve, Active),
            (Pending, Reject, Rejected),
            (Active, MarkSold, Sold),
            (Active, Archive, Inactive),
            (Active, End, Ended),
        ];
        let actions = [Submit, Approve, Reject, MarkSold, Archive, End];

        for from in ListingStatus::ALL {
            for action in actions {
                let expected = allowed
                    .iter()
                    .find(|(f, a, _)| *f == from && *a == action)
                    .map(|(_, _, to)| *to);
                match (from.apply(action), expected) {
                    (Ok(to), Some(want)) => assert_eq!(to, want),
                    (Err(DomainError::Conflict(_)), None) => {}
                    (got, want) => panic!("{from:?} + {action:?}: got {got:?}, want {want:?}"),
                }
            }
        }
    }

    #[test]
    fn approve_on_draft_conflicts() {
        let err = ListingStatus::Draft.apply(ListingAction::Approve).unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn pending_listing_is_locked() {
        let id = ListingId::new();
        assert_eq!(
            ListingStatus::Pending.ensure_editable(id),
            Err(DomainError::ListingUnderReview(id))
        );
        assert_eq!(
            ListingStatus::Pending.ensure_deletable(id),
            Err(DomainError::ListingUnderReview(id))
        );
        assert!(ListingStatus::Sold.ensure_deletable(id).is_err());
        assert!(ListingStatus::Rejected.ensure_deletable(id).is_ok());
        assert!(ListingStatus::Active.ensure_editable(id).is_ok());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in ListingStatus::ALL {
            assert_eq!(ListingStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(ListingStatus::from_str("archived").is_err());
    }

    #[test]
    fn negative_price_is_rejected_on_price_field() {
        let mut fields = sample_fields();
        fields.price = Some(Decimal::from(-5));
        let err = fields.validate().unwrap_err();
        assert_eq!(err.field(), Some("price"));
    }

    #[test]
    fn title_and_description_bounds() {
        let mut fields = sample_fields();
        fields.title = "ab".into();
        assert_eq!(fields.validate().unwrap_err().field(), Some("title"));

        let mut fields = sample_fields();
        fields.title = "x".repeat(101);
        assert_eq!(fields.validate().unwrap_err().field(), Some("title"));

        let mut fields = sample_fields();
        fields.description = "too short".into();
        assert_eq!(fields.validate().unwrap_err().field(), Some("description"));

        let mut fields = sample_fields();
        fields.description = "y".repeat(2001);
        assert_eq!(fields.validate().unwrap_err().field(), Some("description"));
    }

    #[test]
    fn zip_and_location_subfields() {
        assert!(is_valid_zip("8001"));
        assert!(!is_valid_zip("0800"));
        assert!(!is_valid_zip("800"));
        assert!(!is_valid_zip("80a1"));

        let mut fields = sample_fields();
        fields.location.zip = "123".into();
        assert_eq!(fields.validate().unwrap_err().field(), Some("location.zip"));

        let mut fields = sample_fields();
        fields.location.city = "  ".into();
        assert_eq!(fields.validate().unwrap_err().field(), Some("location.city"));

        let mut fields = sample_fields();
        fields.location.lng = None;
        assert_eq!(fields.validate().unwrap_err().field(), Some("location.lat"));
    }

    #[test]
    fn giveaway_carries_no_price() {
        let mut fields = sample_fields();
        fields.listing_type = ListingType::Giveaway;
        assert_eq!(fields.validate().unwrap_err().field(), Some("price"));

        fields.price = Some(Decimal::ZERO);
        assert!(fields.validate_for_review().is_ok());
        assert_eq!(fields.normalized().price, None);
    }

    #[test]
    fn review_requires_price_for_fixed_price() {
        let mut fields = sample_fields();
        fields.price = None;
        assert!(fields.validate().is_ok());
        assert_eq!(fields.validate_for_review().unwrap_err().field(), Some("price"));
    }

    #[test]
    fn patch_can_clear_price() {
        let patch: ListingPatch =
            serde_json::from_str(r#"{"price": null, "title": "Road bike"}"#).unwrap();
        assert_eq!(patch.price, Some(None));

        let fields = patch.apply_to(sample_fields());
        assert_eq!(fields.price, None);
        assert_eq!(fields.title, "Road bike");

        let untouched: ListingPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(untouched.price, None);
        assert_eq!(untouched.apply_to(sample_fields()), sample_fields());
    }

    #[test]
    fn exactly_one_featured_image() {
        let none_flagged = normalize_images(vec![
            image("a.jpg", false),
            image("b.jpg", false),
        ])
        .unwrap();
        assert!(none_flagged[0].is_featured);
        assert!(!none_flagged[1].is_featured);

        let many_flagged = normalize_images(vec![
            image("a.jpg", false),
            image("b.jpg", true),
            image("c.jpg", true),
        ])
        .unwrap();
        let featured: Vec<_> = many_flagged.iter().filter(|i| i.is_featured).collect();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].url, "b.jpg");

        assert!(normalize_images(vec![]).unwrap().is_empty());
        assert!(normalize_images(vec![image(" ", true)]).is_err());
    }

    #[test]
    fn haversine_zurich_bern() {
        let zurich = (47.3769, 8.5417);
        let bern = (46.9480, 7.4474);
        let d = haversine_km(zurich, bern);
        assert!((d - 95.5).abs() < 2.0, "distance was {d}");
        assert!(haversine_km(zurich, zurich) < 1e-9);
    }
}
