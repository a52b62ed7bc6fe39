//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use swoppa_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, DEFAULT_RECENT_RATINGS};
use swoppa_shared::session::parse_verifying_key;
use swoppa_shared::UserId;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Ed25519 public key of the identity provider (hex-encoded, 64 chars).
    /// Env: `AUTH_SERVER_PUBKEY`
    /// Default: all-zeros (development only, no token verifies).
    pub auth_server_pubkey: [u8; 32],

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Operator bearer token for /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (operator API disabled).
    pub admin_token: Option<String>,

    /// Users granted the admin role at start-up (comma separated UUIDs).
    /// Env: `ADMIN_USER_IDS`
    pub admin_user_ids: Vec<UserId>,

    /// Sustained requests per second per client.
    /// Env: `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: f64,

    /// Burst size per client.
    /// Env: `RATE_LIMIT_BURST`
    pub rate_limit_burst: f64,

    /// Recent ratings returned with a rating summary.
    /// Env: `RECENT_RATINGS_LIMIT`
    pub recent_ratings_limit: usize,

    /// Maximum request body size in bytes.
    /// Env: `MAX_BODY_BYTES`
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            auth_server_pubkey: [0u8; 32],
            instance_name: APP_NAME.to_string(),
            admin_token: None,
            admin_user_ids: Vec::new(),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            recent_ratings_limit: DEFAULT_RECENT_RATINGS,
            max_body_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = var("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(hex_key) = var("AUTH_SERVER_PUBKEY") {
            match parse_verifying_key(&hex_key) {
                Some(key) => config.auth_server_pubkey = key,
                None => tracing::warn!(
                    "Invalid AUTH_SERVER_PUBKEY (expected 64 hex chars), using default (dev-only)"
                ),
            }
        }

        if let Some(name) = var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(token) = var("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Some(ids) = var("ADMIN_USER_IDS") {
            config.admin_user_ids = parse_user_ids(&ids);
        }

        if let Some(val) = var("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 => config.rate_limit_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = var("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 => config.rate_limit_burst = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        if let Some(val) = var("RECENT_RATINGS_LIMIT") {
            match val.parse::<usize>() {
                Ok(n) => config.recent_ratings_limit = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid RECENT_RATINGS_LIMIT, using default")
                }
            }
        }

        if let Some(val) = var("MAX_BODY_BYTES") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_body_bytes = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_BODY_BYTES, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn parse_user_ids(list: &str) -> Vec<UserId> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<UserId>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(value = %s, "Ignoring invalid id in ADMIN_USER_IDS");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.auth_server_pubkey, [0u8; 32]);
        assert_eq!(config.recent_ratings_limit, 5);
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_reads_variables() {
        let admin = UserId::new();
        let admin_list = format!("{admin}, not-a-uuid,");
        let pubkey = "ab".repeat(32);
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/swoppa.db"),
            ("AUTH_SERVER_PUBKEY", pubkey.as_str()),
            ("ADMIN_TOKEN", "s3cret"),
            ("ADMIN_USER_IDS", admin_list.as_str()),
            ("RECENT_RATINGS_LIMIT", "3"),
        ]);

        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/swoppa.db")));
        assert_eq!(config.auth_server_pubkey, [0xab; 32]);
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.admin_user_ids, vec![admin]);
        assert_eq!(config.recent_ratings_limit, 3);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("HTTP_ADDR", "nowhere"),
            ("AUTH_SERVER_PUBKEY", "abcd"),
            ("ADMIN_TOKEN", ""),
            ("RATE_LIMIT_PER_SEC", "-1"),
            ("MAX_BODY_BYTES", "lots"),
        ]);
        let default = ServerConfig::default();

        assert_eq!(config.http_addr, default.http_addr);
        assert_eq!(config.auth_server_pubkey, default.auth_server_pubkey);
        assert!(config.admin_token.is_none());
        assert_eq!(config.rate_limit_per_sec, default.rate_limit_per_sec);
        assert_eq!(config.max_body_bytes, default.max_body_bytes);
    }
}
