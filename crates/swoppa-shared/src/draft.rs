//! Content of an in-progress listing form held in a draft session.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::listing::{Condition, ListingFields, ListingType, Location, NewImage};

/// Every member is optional: the form may be saved half-filled.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<Condition>,
    pub listing_type: Option<ListingType>,
    pub price: Option<Decimal>,
    pub auction_start_price: Option<Decimal>,
    pub auction_min_price: Option<Decimal>,
    pub auction_end_time: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub allow_trade: Option<bool>,
    pub shipping_available: Option<bool>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub featured_index: Option<usize>,
}

impl DraftContent {
    /// Pre-fill a session from an existing listing.
    pub fn from_listing(fields: &ListingFields, images: &[NewImage]) -> Self {
        Self {
            title: Some(fields.title.clone()),
            description: Some(fields.description.clone()),
            category: Some(fields.category.clone()),
            condition: Some(fields.condition),
            listing_type: Some(fields.listing_type),
            price: fields.price,
            auction_start_price: fields.auction_start_price,
            auction_min_price: fields.auction_min_price,
            auction_end_time: fields.auction_end_time,
            location: Some(fields.location.clone()),
            allow_trade: Some(fields.allow_trade),
            shipping_available: Some(fields.shipping_available),
            image_urls: images.iter().map(|img| img.url.clone()).collect(),
            featured_index: images.iter().position(|img| img.is_featured),
        }
    }

    /// Complete listing fields, or a `Validation` error naming the first
    /// missing member.
    pub fn to_fields(&self) -> DomainResult<ListingFields> {
        Ok(ListingFields {
            title: required("title", &self.title)?,
            description: required("description", &self.description)?,
            category: required("category", &self.category)?,
            condition: required("condition", &self.condition)?,
            listing_type: self.listing_type.unwrap_or_default(),
            price: self.price,
            auction_start_price: self.auction_start_price,
            auction_min_price: self.auction_min_price,
            auction_end_time: self.auction_end_time,
            location: required("location", &self.location)?,
            allow_trade: self.allow_trade.unwrap_or(false),
            shipping_available: self.shipping_available.unwrap_or(false),
        })
    }

    pub fn images(&self) -> Vec<NewImage> {
        self.image_urls
            .iter()
            .enumerate()
            .map(|(i, url)| NewImage {
                url: url.clone(),
                is_featured: self.featured_index == Some(i),
            })
            .collect()
    }
}

fn required<T: Clone>(field: &str, value: &Option<T>) -> DomainResult<T> {
    value
        .clone()
        .ok_or_else(|| DomainError::validation(field, "is required"))
}
