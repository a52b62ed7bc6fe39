use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use swoppa_shared::{ConversationId, ListingId, UserId};
use swoppa_store::{Conversation, ConversationSummary, Message, MessagePage};

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

#[derive(Deserialize)]
pub struct StartConversationRequest {
    listing_id: ListingId,
    other_user_id: UserId,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    content: String,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    marked: u32,
}

#[derive(Serialize)]
pub struct UnreadResponse {
    count: u32,
}

pub async fn start_conversation(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<Conversation>, ServerError> {
    let conversation = state
        .market
        .start_conversation(req.listing_id, caller, req.other_user_id)?;
    Ok(Json(conversation))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<ConversationSummary>>, ServerError> {
    Ok(Json(state.market.list_conversations(caller)?))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.market.delete_conversation(id, caller)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// `?after=<rfc3339>&limit=<n>` pages the history; no parameters returns
/// all of it.
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ConversationId>,
    Query(page): Query<MessagePage>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let page = (page != MessagePage::default()).then_some(page);
    Ok(Json(state.market.list_messages(id, caller, page)?))
}

pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ConversationId>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    Ok(Json(state.market.send_message(id, caller, &req.content)?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<MarkReadResponse>, ServerError> {
    let marked = state.market.mark_read(id, caller)?;
    Ok(Json(MarkReadResponse { marked }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<UnreadResponse>, ServerError> {
    let count = state.market.unread_count(caller)?;
    Ok(Json(UnreadResponse { count }))
}
