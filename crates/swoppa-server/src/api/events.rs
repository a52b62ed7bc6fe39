//! Server-Sent Event streams. Each event names what changed; clients
//! re-read through the regular endpoints.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::BoxStream;
use swoppa_shared::events::MarketEvent;
use swoppa_shared::ConversationId;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

use super::AppState;
use crate::auth::AuthUser;
use crate::error::ServerError;

type EventStream = Sse<BoxStream<'static, Result<Event, Infallible>>>;

/// New messages in one conversation. Participants only.
pub async fn conversation_events(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<EventStream, ServerError> {
    let topic = state.market.conversation_topic(id, caller)?;
    debug!(conversation = %id, user = %caller, "Conversation stream opened");
    Ok(stream(state.events.subscribe(&topic)))
}

/// Unread counter and listing status changes for the caller.
pub async fn user_events(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> EventStream {
    debug!(user = %caller, "User stream opened");
    stream(state.events.subscribe(&caller.to_topic()))
}

fn stream(rx: broadcast::Receiver<MarketEvent>) -> EventStream {
    let events = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(event) => Event::default()
            .event(event.name())
            .json_data(&event)
            .ok()
            .map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "Event stream lagged");
            None
        }
    });
    let events: BoxStream<'static, Result<Event, Infallible>> = Box::pin(events);
    Sse::new(events).keep_alive(KeepAlive::default())
}
