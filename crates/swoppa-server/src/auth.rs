//! Session token verification, caching and the request extractors built on
//! it.
//!
//! Tokens are issued by the identity provider and signed with its Ed25519
//! key. Successful verifications are cached until the token expires so the
//! signature is not re-checked on every request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use swoppa_shared::session::{verify_session_token, SessionToken};
use swoppa_shared::UserId;
use tokio::sync::RwLock;
use tracing::debug;

use crate::api::AppState;
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Cached entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedSession {
    user_id: UserId,
    valid_until: DateTime<Utc>,
}

impl CachedSession {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.valid_until
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionVerifier {
    /// The identity provider's Ed25519 public key.
    provider_pubkey: [u8; 32],
    /// Cache: token fingerprint -> verified session.
    cache: Arc<RwLock<HashMap<String, CachedSession>>>,
}

impl SessionVerifier {
    pub fn new(provider_pubkey: [u8; 32]) -> Self {
        Self {
            provider_pubkey,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The user the token speaks for, if it is authentic and unexpired.
    pub async fn verify(&self, token: &SessionToken) -> Option<UserId> {
        let key = token.fingerprint();

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if entry.is_fresh() && entry.user_id == token.user_id {
                    return Some(entry.user_id);
                }
            }
        }

        if !verify_session_token(token, &self.provider_pubkey) {
            debug!(user = %token.user_id, "Session verification failed");
            return None;
        }

        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CachedSession {
                user_id: token.user_id,
                valid_until: token.valid_until,
            },
        );
        debug!(user = %token.user_id, until = %token.valid_until, "Session verified");
        Some(token.user_id)
    }

    /// Verify the wire form of a token.
    pub async fn verify_bearer(&self, bearer: &str) -> Option<UserId> {
        let token = SessionToken::decode(bearer)?;
        self.verify(&token).await
    }

    /// Evict expired entries from the cache.
    pub async fn purge_expired(&self) {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.is_fresh());
        let removed = before - cache.len();
        if removed > 0 {
            debug!(removed, "Purged expired session cache entries");
        }
    }
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

/// An authenticated caller. Rejects with 401 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

/// A caller who may be anonymous. A token that is present but invalid is
/// still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<UserId>);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(AuthUser(user)),
            MaybeUser(None) => Err(ServerError::Unauthorized("missing session token".into())),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(bearer) = bearer_token(parts) else {
            return Ok(MaybeUser(None));
        };
        match state.sessions.verify_bearer(&bearer).await {
            Some(user) => Ok(MaybeUser(Some(user))),
            None => Err(ServerError::Unauthorized("invalid or expired session token".into())),
        }
    }
}

/// `Authorization: Bearer <token>`, or an `access_token` query parameter for
/// EventSource clients that cannot set headers.
pub(crate) fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        let value = value.to_str().ok()?;
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    parts.uri.query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("access_token="))
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use swoppa_shared::session::create_session_token;

    #[tokio::test]
    async fn test_verify_valid_token() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let verifier = SessionVerifier::new(provider_key.verifying_key().to_bytes());
        let user = UserId::new();

        let token = create_session_token(user, Utc::now() + Duration::hours(1), &provider_key);
        assert_eq!(verifier.verify(&token).await, Some(user));
        // Second call is served from the cache.
        assert_eq!(verifier.verify_bearer(&token.encode()).await, Some(user));
    }

    #[tokio::test]
    async fn test_verify_expired_token() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let verifier = SessionVerifier::new(provider_key.verifying_key().to_bytes());

        let token = create_session_token(
            UserId::new(),
            Utc::now() - Duration::minutes(1),
            &provider_key,
        );
        assert_eq!(verifier.verify(&token).await, None);
    }

    #[tokio::test]
    async fn test_verify_wrong_key() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let other_key = SigningKey::generate(&mut OsRng);
        let verifier = SessionVerifier::new(other_key.verifying_key().to_bytes());

        let token =
            create_session_token(UserId::new(), Utc::now() + Duration::hours(1), &provider_key);
        assert_eq!(verifier.verify(&token).await, None);
        assert_eq!(verifier.verify_bearer("not-a-token").await, None);
    }

    #[tokio::test]
    async fn test_forged_user_is_rejected_after_caching() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let verifier = SessionVerifier::new(provider_key.verifying_key().to_bytes());

        let token =
            create_session_token(UserId::new(), Utc::now() + Duration::hours(1), &provider_key);
        assert!(verifier.verify(&token).await.is_some());

        // Same signature, different claimed user.
        let mut forged = token.clone();
        forged.user_id = UserId::new();
        assert_eq!(verifier.verify(&forged).await, None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let verifier = SessionVerifier::new(provider_key.verifying_key().to_bytes());
        let token =
            create_session_token(UserId::new(), Utc::now() + Duration::hours(1), &provider_key);
        verifier.verify(&token).await;

        verifier.purge_expired().await;
        assert_eq!(verifier.cache.read().await.len(), 1);

        verifier.cache.write().await.values_mut().for_each(|entry| {
            entry.valid_until = Utc::now() - Duration::seconds(1);
        });
        verifier.purge_expired().await;
        assert!(verifier.cache.read().await.is_empty());
    }
}
