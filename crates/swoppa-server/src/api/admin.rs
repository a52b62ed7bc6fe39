//! Operator endpoints, protected by the configured `ADMIN_TOKEN`. These
//! manage the admin role; moderation itself uses user sessions.

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use swoppa_shared::UserId;
use tracing::info;

use super::AppState;
use crate::auth::bearer_token;
use crate::error::ServerError;

/// Proof that the request carried the operator token.
pub struct Operator;

#[axum::async_trait]
impl FromRequestParts<AppState> for Operator {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_token.as_deref().ok_or_else(|| {
            ServerError::Forbidden("operator API is disabled (no ADMIN_TOKEN configured)".into())
        })?;
        let presented = bearer_token(parts).unwrap_or_default();

        if tokens_match(presented.as_bytes(), expected.as_bytes()) {
            Ok(Operator)
        } else {
            Err(ServerError::Forbidden("invalid operator token".into()))
        }
    }
}

fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len() && bool::from(presented.ct_eq(expected))
}

#[derive(Deserialize)]
pub struct AdminRoleRequest {
    user_id: UserId,
}

#[derive(Serialize)]
pub struct InstanceStatus {
    name: String,
    version: &'static str,
    uptime_secs: u64,
    admins: usize,
}

pub async fn admin_status(
    _: Operator,
    State(state): State<AppState>,
) -> Result<Json<InstanceStatus>, ServerError> {
    Ok(Json(InstanceStatus {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        admins: state.market.list_admins()?.len(),
    }))
}

pub async fn grant_admin(
    _: Operator,
    State(state): State<AppState>,
    Json(req): Json<AdminRoleRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let newly_granted = state.market.grant_admin(req.user_id)?;
    info!(user = %req.user_id, newly_granted, "Operator granted admin role");
    Ok(Json(serde_json::json!({ "granted": true, "changed": newly_granted })))
}

pub async fn revoke_admin(
    _: Operator,
    State(state): State<AppState>,
    Json(req): Json<AdminRoleRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let was_admin = state.market.revoke_admin(req.user_id)?;
    info!(user = %req.user_id, was_admin, "Operator revoked admin role");
    Ok(Json(serde_json::json!({ "revoked": true, "changed": was_admin })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match(b"s3cret", b"s3cret"));
        assert!(!tokens_match(b"s3cre", b"s3cret"));
        assert!(!tokens_match(b"s3creT", b"s3cret"));
        assert!(!tokens_match(b"", b"s3cret"));
    }
}
