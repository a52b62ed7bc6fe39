use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use swoppa_shared::UserId;
use swoppa_store::Profile;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct ProfileRequest {
    username: String,
    avatar_url: Option<String>,
}

pub async fn upsert_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<Profile>, ServerError> {
    let profile = state
        .market
        .upsert_profile(caller, &req.username, req.avatar_url.as_deref())?;
    Ok(Json(profile))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.market.get_profile(user)?))
}
