//! Per-principal rate limiting.
//!
//! Sliding-window counter keyed by the authenticated account id (the layer
//! sits inside the auth middleware, so claims are always present on protected
//! routes; the peer IP is the fallback for anything else). Limits come from
//! the environment so ops can tune them without a rebuild.

use crate::auth::Claims;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
    /// Extra requests tolerated above the limit before a hard reject.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window: Duration::from_secs(60),
            burst: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_requests: std::env::var("RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_requests),
            window: Duration::from_secs(60),
            burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.burst),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<String, WindowEntry>>>,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

enum Verdict {
    Allowed,
    Exceeded { retry_after: Duration },
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, key: &str) -> Verdict {
        let mut state = self.state.lock();
        let now = Instant::now();

        let entry = state.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count += 1;

        if entry.count > self.config.max_requests + self.config.burst {
            Verdict::Exceeded {
                retry_after: (entry.window_start + self.config.window).duration_since(now),
            }
        } else {
            Verdict::Allowed
        }
    }

    /// Drop stale windows. Run from a background task.
    pub fn cleanup(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        let window = self.config.window;
        state.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimitLayer>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = match request.extensions().get::<Claims>() {
        Some(claims) => claims.sub.clone(),
        None => connect_info
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    };

    match limiter.check(&key) {
        Verdict::Allowed => next.run(request).await,
        Verdict::Exceeded { retry_after } => {
            warn!(
                key = %key,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );

            let body = serde_json::json!({
                "error": "rate_limit_exceeded",
                "message": "Too many requests. Please slow down.",
                "retry_after_seconds": retry_after.as_secs(),
            });

            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().to_string())],
                axum::Json(body),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, burst: u32) -> RateLimitLayer {
        RateLimitLayer::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
            burst,
        })
    }

    #[test]
    fn test_allows_up_to_limit_plus_burst() {
        let limiter = limiter(5, 3);
        for _ in 0..8 {
            assert!(matches!(limiter.check("acct-1"), Verdict::Allowed));
        }
        assert!(matches!(
            limiter.check("acct-1"),
            Verdict::Exceeded { .. }
        ));
    }

    #[test]
    fn test_keys_are_isolated() {
        let limiter = limiter(2, 0);
        limiter.check("acct-1");
        limiter.check("acct-1");
        assert!(matches!(
            limiter.check("acct-1"),
            Verdict::Exceeded { .. }
        ));
        assert!(matches!(limiter.check("acct-2"), Verdict::Allowed));
    }

    #[test]
    fn test_cleanup_drops_stale_entries() {
        let limiter = RateLimitLayer::new(RateLimitConfig {
            max_requests: 5,
            window: Duration::from_millis(1),
            burst: 0,
        });
        limiter.check("acct-1");
        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup();
        assert!(limiter.state.lock().is_empty());
    }
}
