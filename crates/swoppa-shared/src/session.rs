use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

// Token signed by the identity provider, presented as a bearer credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionToken {
    pub user_id: UserId,
    pub valid_until: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl SessionToken {
    /// Wire form: URL-safe base64 (no padding) of the JSON token.
    pub fn encode(&self) -> String {
        // Serializing a plain struct of ids, timestamps and bytes cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(bearer: &str) -> Option<Self> {
        let json = URL_SAFE_NO_PAD.decode(bearer.trim()).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Stable cache key for verification results.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.signature)
    }
}

/// Parse the identity provider key from its 64-character hex form.
pub fn parse_verifying_key(hex_str: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim()).ok()?;
    bytes.try_into().ok()
}

fn signing_payload(user_id: &UserId, valid_until: &DateTime<Utc>) -> Vec<u8> {
    // payload = user uuid bytes || valid_until (rfc3339)
    let mut payload = Vec::with_capacity(48);
    payload.extend_from_slice(user_id.as_uuid().as_bytes());
    payload.extend_from_slice(valid_until.to_rfc3339().as_bytes());
    payload
}

pub fn verify_session_token(token: &SessionToken, provider_pubkey: &[u8; 32]) -> bool {
    verify_session_token_at(token, provider_pubkey, Utc::now())
}

pub fn verify_session_token_at(
    token: &SessionToken,
    provider_pubkey: &[u8; 32],
    now: DateTime<Utc>,
) -> bool {
    if now > token.valid_until {
        return false;
    }

    let Ok(verifying_key) = VerifyingKey::from_bytes(provider_pubkey) else {
        return false;
    };

    let Ok(signature) = Signature::from_slice(&token.signature) else {
        return false;
    };

    let payload = signing_payload(&token.user_id, &token.valid_until);
    verifying_key.verify(&payload, &signature).is_ok()
}

pub fn create_session_token(
    user_id: UserId,
    valid_until: DateTime<Utc>,
    provider_signing_key: &ed25519_dalek::SigningKey,
) -> SessionToken {
    use ed25519_dalek::Signer;

    let signature = provider_signing_key.sign(&signing_payload(&user_id, &valid_until));

    SessionToken {
        user_id,
        valid_until,
        signature: signature.to_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn test_session_token_valid() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let provider_pubkey = provider_key.verifying_key().to_bytes();

        let token = create_session_token(
            UserId::new(),
            Utc::now() + Duration::hours(1),
            &provider_key,
        );

        assert!(verify_session_token(&token, &provider_pubkey));
    }

    #[test]
    fn test_session_token_expired() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let provider_pubkey = provider_key.verifying_key().to_bytes();

        let token = create_session_token(
            UserId::new(),
            Utc::now() - Duration::minutes(1),
            &provider_key,
        );

        assert!(!verify_session_token(&token, &provider_pubkey));
    }

    #[test]
    fn test_session_token_wrong_provider_key() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let wrong_pubkey = SigningKey::generate(&mut OsRng).verifying_key().to_bytes();

        let token = create_session_token(
            UserId::new(),
            Utc::now() + Duration::hours(1),
            &provider_key,
        );

        assert!(!verify_session_token(&token, &wrong_pubkey));
    }

    #[test]
    fn test_swapped_user_fails() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let provider_pubkey = provider_key.verifying_key().to_bytes();

        let mut token = create_session_token(
            UserId::new(),
            Utc::now() + Duration::hours(1),
            &provider_key,
        );
        token.user_id = UserId::new();

        assert!(!verify_session_token(&token, &provider_pubkey));
    }

    #[test]
    fn test_bearer_round_trip() {
        let provider_key = SigningKey::generate(&mut OsRng);
        let token = create_session_token(
            UserId::new(),
            Utc::now() + Duration::hours(1),
            &provider_key,
        );

        let decoded = SessionToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
        assert!(SessionToken::decode("not base64 !!").is_none());
    }

    #[test]
    fn test_parse_verifying_key() {
        let key = SigningKey::generate(&mut OsRng).verifying_key().to_bytes();
        assert_eq!(parse_verifying_key(&hex::encode(key)), Some(key));
        assert_eq!(parse_verifying_key("abcd"), None);
        assert_eq!(parse_verifying_key("zz"), None);
    }
}
