use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use swoppa_shared::ListingId;
use swoppa_store::FavoriteListing;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Serialize)]
pub struct FavoriteState {
    favorite: bool,
    /// Whether this call changed anything.
    changed: bool,
}

pub async fn list_favorites(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<FavoriteListing>>, ServerError> {
    Ok(Json(state.market.list_favorites(caller)?))
}

pub async fn is_favorite(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(listing_id): Path<ListingId>,
) -> Result<Json<FavoriteState>, ServerError> {
    let favorite = state.market.is_favorite(caller, listing_id)?;
    Ok(Json(FavoriteState {
        favorite,
        changed: false,
    }))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(listing_id): Path<ListingId>,
) -> Result<Json<FavoriteState>, ServerError> {
    let changed = state.market.add_favorite(caller, listing_id)?;
    Ok(Json(FavoriteState {
        favorite: true,
        changed,
    }))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(listing_id): Path<ListingId>,
) -> Result<Json<FavoriteState>, ServerError> {
    let changed = state.market.remove_favorite(caller, listing_id)?;
    Ok(Json(FavoriteState {
        favorite: false,
        changed,
    }))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(listing_id): Path<ListingId>,
) -> Result<Json<FavoriteState>, ServerError> {
    let favorite = state.market.toggle_favorite(caller, listing_id)?;
    Ok(Json(FavoriteState {
        favorite,
        changed: true,
    }))
}
