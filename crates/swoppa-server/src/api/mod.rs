//! REST and SSE surface of the marketplace.
//!
//! Handlers stay thin: extract, call [`Marketplace`], serialize. Errors
//! become `{"error", "code", "field"?}` bodies through [`ServerError`].

mod admin;
mod drafts;
mod events;
mod favorites;
mod listings;
mod messaging;
mod moderation;
mod profiles;
mod ratings;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::Method,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::SessionVerifier;
use crate::config::ServerConfig;
use crate::market::Marketplace;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::realtime::EventBus;

#[derive(Clone)]
pub struct AppState {
    pub market: Arc<Marketplace>,
    pub sessions: Arc<SessionVerifier>,
    pub events: EventBus,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // Profiles
        .route("/profile", put(profiles::upsert_profile))
        .route("/users/:id", get(profiles::get_profile))
        // Listings
        .route(
            "/listings",
            post(listings::create_listing).get(listings::browse_listings),
        )
        .route("/listings/mine", get(listings::list_own_listings))
        .route(
            "/listings/:id",
            get(listings::get_listing)
                .patch(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/listings/:id/images", put(listings::replace_images))
        .route("/listings/:id/submit", post(listings::submit_listing))
        .route("/listings/:id/archive", post(listings::archive_listing))
        .route("/listings/:id/end", post(listings::end_listing))
        .route("/listings/:id/sold", post(listings::mark_sold))
        .route("/listings/:id/view", post(listings::record_view))
        .route("/listings/:id/report", post(listings::report_listing))
        // Moderation
        .route("/moderation/listings", get(moderation::list_pending))
        .route(
            "/moderation/listings/:id/approve",
            post(moderation::approve_listing),
        )
        .route(
            "/moderation/listings/:id/reject",
            post(moderation::reject_listing),
        )
        .route("/moderation/reports", get(moderation::list_open_reports))
        .route(
            "/moderation/reports/:id/resolve",
            post(moderation::resolve_report),
        )
        // Conversations & messages
        .route(
            "/conversations",
            post(messaging::start_conversation).get(messaging::list_conversations),
        )
        .route(
            "/conversations/:id",
            axum::routing::delete(messaging::delete_conversation),
        )
        .route(
            "/conversations/:id/messages",
            get(messaging::list_messages).post(messaging::send_message),
        )
        .route("/conversations/:id/read", post(messaging::mark_read))
        .route("/messages/unread", get(messaging::unread_count))
        // Favorites
        .route("/favorites", get(favorites::list_favorites))
        .route(
            "/favorites/:listing_id",
            get(favorites::is_favorite)
                .put(favorites::add_favorite)
                .delete(favorites::remove_favorite),
        )
        .route(
            "/favorites/:listing_id/toggle",
            post(favorites::toggle_favorite),
        )
        // Ratings ledger
        .route("/users/:id/ratings", get(ratings::rating_summary))
        .route("/users/:id/can-rate", get(ratings::can_rate))
        .route("/transactions", get(ratings::list_transactions))
        .route("/transactions/:id/ratings", post(ratings::submit_rating))
        // Draft sessions
        .route(
            "/drafts",
            post(drafts::open_draft).get(drafts::list_drafts),
        )
        .route(
            "/drafts/:id",
            get(drafts::get_draft)
                .put(drafts::save_draft)
                .delete(drafts::discard_draft),
        )
        .route("/drafts/:id/commit", post(drafts::commit_draft))
        // Realtime
        .route(
            "/events/conversations/:id",
            get(events::conversation_events),
        )
        .route("/events/me", get(events::user_events))
        // Operator
        .route("/admin/status", get(admin::admin_status))
        .route("/admin/grant", post(admin::grant_admin))
        .route("/admin/revoke", post(admin::revoke_admin))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
