//! # swoppa-server
//!
//! HTTP service for the Swoppa marketplace.
//!
//! This binary provides:
//! - **REST API** (axum) for listings, moderation, conversations,
//!   favorites, ratings and draft sessions
//! - **Server-Sent Events** carrying realtime invalidation hints
//! - **Session verification** of tokens signed by the identity provider
//! - **Per-IP rate limiting** with a separate budget for writes

mod api;
mod auth;
mod config;
mod error;
mod market;
mod rate_limit;
mod realtime;

use std::sync::Arc;
use std::time::{Duration, Instant};

use swoppa_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::auth::SessionVerifier;
use crate::config::ServerConfig;
use crate::market::Marketplace;
use crate::rate_limit::RateLimiter;
use crate::realtime::EventBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,swoppa_server=debug")),
        )
        .init();

    info!("Starting Swoppa server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(addr = %config.http_addr, database = ?config.database_path, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        operator_api = config.admin_token.is_some(),
        seeded_admins = config.admin_user_ids.len(),
        "Instance settings"
    );
    if config.auth_server_pubkey == [0u8; 32] {
        tracing::warn!("AUTH_SERVER_PUBKEY not set; no session token will verify");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    info!(path = ?db.path(), "Database ready");

    let events = EventBus::new();
    let market = Arc::new(Marketplace::new(
        db,
        events.clone(),
        config.recent_ratings_limit,
    ));
    let seeded = market.seed_admins(&config.admin_user_ids)?;
    if seeded > 0 {
        info!(seeded, "Admin roles granted from ADMIN_USER_IDS");
    }

    let sessions = Arc::new(SessionVerifier::new(config.auth_server_pubkey));
    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    let app_state = AppState {
        market,
        sessions: sessions.clone(),
        events: events.clone(),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
        started_at: Instant::now(),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // Session cache cleanup (every 10 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // Idle event topics (every minute)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            events.prune();
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
