//! Draft sessions for the listing form.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use swoppa_shared::draft::DraftContent;
use swoppa_shared::{DraftId, ListingId};
use swoppa_store::{Listing, ListingDraft};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct OpenDraftRequest {
    /// Pre-fill from this listing instead of starting empty.
    listing_id: Option<ListingId>,
}

#[derive(Deserialize)]
pub struct CommitDraftRequest {
    #[serde(default)]
    submit: bool,
}

pub async fn open_draft(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    req: Option<Json<OpenDraftRequest>>,
) -> Result<Json<ListingDraft>, ServerError> {
    let listing_id = req.and_then(|Json(req)| req.listing_id);
    Ok(Json(state.market.open_draft(caller, listing_id)?))
}

pub async fn list_drafts(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<ListingDraft>>, ServerError> {
    Ok(Json(state.market.list_drafts(caller)?))
}

pub async fn get_draft(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<DraftId>,
) -> Result<Json<ListingDraft>, ServerError> {
    Ok(Json(state.market.get_draft(id, caller)?))
}

pub async fn save_draft(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<DraftId>,
    Json(content): Json<DraftContent>,
) -> Result<Json<ListingDraft>, ServerError> {
    Ok(Json(state.market.save_draft(id, caller, &content)?))
}

pub async fn discard_draft(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<DraftId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.market.discard_draft(id, caller)?;
    Ok(Json(serde_json::json!({ "discarded": true })))
}

pub async fn commit_draft(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<DraftId>,
    req: Option<Json<CommitDraftRequest>>,
) -> Result<Json<Listing>, ServerError> {
    let submit = req.is_some_and(|Json(req)| req.submit);
    Ok(Json(state.market.commit_draft(id, caller, submit)?))
}
