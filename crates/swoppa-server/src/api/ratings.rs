use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use swoppa_shared::rating::RatingScores;
use swoppa_shared::{TransactionId, UserId};
use swoppa_store::{Rating, RatingSummary, Transaction};
use tracing::info;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct SubmitRatingRequest {
    rated_user_id: UserId,
    communication_rating: u8,
    reliability_rating: u8,
    overall_rating: u8,
    comment: String,
}

#[derive(Serialize)]
pub struct CanRateResponse {
    can_rate: bool,
}

pub async fn rating_summary(
    State(state): State<AppState>,
    Path(user): Path<UserId>,
) -> Result<Json<RatingSummary>, ServerError> {
    Ok(Json(state.market.rating_summary(user)?))
}

pub async fn can_rate(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(rated): Path<UserId>,
) -> Result<Json<CanRateResponse>, ServerError> {
    let can_rate = state.market.can_rate(caller, rated)?;
    Ok(Json(CanRateResponse { can_rate }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<Transaction>>, ServerError> {
    Ok(Json(state.market.list_transactions(caller)?))
}

pub async fn submit_rating(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(transaction_id): Path<TransactionId>,
    Json(req): Json<SubmitRatingRequest>,
) -> Result<Json<Rating>, ServerError> {
    let scores = RatingScores {
        communication: req.communication_rating,
        reliability: req.reliability_rating,
        overall: req.overall_rating,
    };
    let rating = state.market.submit_rating(
        transaction_id,
        caller,
        req.rated_user_id,
        scores,
        &req.comment,
    )?;
    info!(
        transaction = %transaction_id,
        rater = %caller,
        rated = %req.rated_user_id,
        "Rating submitted"
    );
    Ok(Json(rating))
}
