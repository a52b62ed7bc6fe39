//! Moderation endpoints. The admin role is checked by the marketplace, not
//! here.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use swoppa_shared::moderation::ReportOutcome;
use swoppa_shared::{ListingId, ReportId};
use swoppa_store::{Listing, OpenReport, PendingListing, Report};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct RejectRequest {
    reason: String,
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    outcome: ReportOutcome,
    notes: Option<String>,
}

pub async fn list_pending(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<PendingListing>>, ServerError> {
    Ok(Json(state.market.list_pending_listings(caller)?))
}

pub async fn approve_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.approve_listing(caller, id)?))
}

pub async fn reject_listing(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ListingId>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Listing>, ServerError> {
    Ok(Json(state.market.reject_listing(caller, id, &req.reason)?))
}

pub async fn list_open_reports(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<OpenReport>>, ServerError> {
    Ok(Json(state.market.list_open_reports(caller)?))
}

pub async fn resolve_report(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ReportId>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<Report>, ServerError> {
    let report = state
        .market
        .resolve_report(caller, id, req.outcome, req.notes.as_deref())?;
    Ok(Json(report))
}
