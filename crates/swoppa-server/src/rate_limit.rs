use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ServerError;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, limit: Limit) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * limit.rate).min(limit.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Reads and writes draw from separate buckets; writes get the smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    Read,
    Write,
}

impl RequestClass {
    fn of(method: &Method) -> Self {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            Self::Read
        } else {
            Self::Write
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Limit {
    rate: f64,
    capacity: f64,
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<(IpAddr, RequestClass), TokenBucket>>>,
    read: Limit,
    write: Limit,
}

impl RateLimiter {
    /// `rate` tokens per second up to `capacity` for reads; writes get a
    /// third of each.
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            read: Limit { rate, capacity },
            write: Limit {
                rate: rate / 3.0,
                capacity: (capacity / 3.0).max(1.0),
            },
        }
    }

    pub async fn check(&self, ip: IpAddr, class: RequestClass) -> bool {
        let limit = match class {
            RequestClass::Read => self.read,
            RequestClass::Write => self.write,
        };
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry((ip, class))
            .or_insert_with(|| TokenBucket::new(limit.capacity));
        bucket.try_consume(limit)
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10.0, 30.0)
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(ip) = extract_client_ip(&req) {
        let class = RequestClass::of(req.method());
        if !limiter.check(ip, class).await {
            warn!(ip = %ip, ?class, "Rate limit exceeded");
            return Err(ServerError::RateLimited);
        }
    }

    Ok(next.run(req).await)
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    if let Some(forwarded) = header_str(req, "x-forwarded-for") {
        if let Some(Ok(ip)) = forwarded
            .split(',')
            .next()
            .map(|first| first.trim().parse::<IpAddr>())
        {
            return Some(ip);
        }
    }

    header_str(req, "x-real-ip").and_then(|value| value.trim().parse().ok())
}

fn header_str<'r, B>(req: &'r Request<B>, name: &str) -> Option<&'r str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}
