use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use swoppa_shared::listing::{ListingFields, ListingPatch, ListingQuery, ListingStatus, NewImage};
use swoppa_shared::moderation::ReportReason;
use swoppa_shared::{ListingId, UserId};
use swoppa_store::{Listing, Report, Transaction};
use tracing::info;

use super::AppState;
use crate::auth::{AuthUser, MaybeUser};
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct CreateListingRequest {
    #[serde(flatten)]
    fields: ListingFields,
    #[serde(default)]
    images: Vec<NewImage>,
    /// Keep the listing out of moderation for now.
    #[serde(default)]
    save_as_draft: bool,
}

#[derive(Deserialize)]
pub struct OwnListingsQuery {
    status: Option<ListingStatus>,
}

#[derive(Deserialize)]
pub struct ReplaceImagesRequest {
    images: Vec<NewImage>,
}

#[derive(Deserialize)]
pub struct MarkSoldRequest {
    buyer_id: Option<UserId>,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    reason: ReportReason,
    details: String,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    deleted: bool,
}

#[derive(Serialize)]
pub struct ViewResponse {
    recorded: bool,
}

pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<Listing>, ServerError> {
    let listing = state
        .market
        .create_listing(caller, req.fields, req.images, req.save_as_draft)?;
    Ok(Json(listing))
}

pub async fn browse_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Listing>>, ServerError> {
    Ok(Json(state.market.browse_listings(&query)?))
}

pub async fn list_own_listings(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<OwnListingsQuery>,
) -> Result<Json<Vec<Listing>>, ServerError> {
    Ok(Json(state.market.list_own_listings(caller, query.status)?))
}

pub async fn get_listing(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<ListingId>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.get_listing(id, viewer)?))
}

pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
    Json(patch): Json<ListingPatch>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.update_listing(id, caller, patch)?))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
) -> Result<Json<DeletedResponse>, ServerError> {
    let deleted = state.market.delete_listing(id, caller)?;
    if deleted {
        info!(listing = %id, owner = %caller, "Listing deleted");
    }
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn replace_images(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
    Json(req): Json<ReplaceImagesRequest>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.replace_images(id, caller, req.images)?))
}

pub async fn submit_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.submit_listing(id, caller)?))
}

pub async fn archive_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.archive_listing(id, caller)?))
}

pub async fn end_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.end_listing(id, caller)?))
}

/// The body is optional; without a buyer the sale is recorded against the
/// unknown-buyer sentinel.
pub async fn mark_sold(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
    req: Option<Json<MarkSoldRequest>>,
) -> Result<Json<Transaction>, ServerError> {
    let buyer = req.and_then(|Json(req)| req.buyer_id);
    let transaction = state.market.mark_sold(id, caller, buyer)?;
    info!(listing = %id, transaction = %transaction.id, "Listing sold");
    Ok(Json(transaction))
}

pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<ListingId>,
) -> Result<Json<ViewResponse>, ServerError> {
    let recorded = state.market.record_view(id)?;
    Ok(Json(ViewResponse { recorded }))
}

/// Anyone may report; the reporter is recorded when a session is present.
pub async fn report_listing(
    State(state): State<AppState>,
    MaybeUser(reporter): MaybeUser,
    Path(id): Path<ListingId>,
    Json(req): Json<ReportRequest>,
) -> Result<Json<Report>, ServerError> {
    let report = state
        .market
        .report_listing(id, reporter, req.reason, &req.details)?;
    info!(listing = %id, report = %report.id, reason = req.reason.as_str(), "Listing reported");
    Ok(Json(report))
}
