// crates/backend-lib/src/middleware/rate_limit.rs

//! Fixed-window request limiter keyed by client address.
use axum::{
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitSettings;
use crate::metrics::RATE_LIMITED;
use crate::storage::Storage;
use crate::{error::AppError, AppState};

/// Rate limit entry for a client
#[derive(Debug)]
struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

/// Counts requests per client within a fixed window
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            entries: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(Duration::from_secs(settings.window_secs), settings.max_requests)
    }

    /// Count one request from `client`; false once the window's budget is spent
    pub fn check(&self, client: &str) -> bool {
        let mut entry = self
            .entries
            .entry(client.to_string())
            .or_insert_with(|| RateLimitEntry {
                requests: 0,
                window_start: Instant::now(),
            });

        if entry.window_start.elapsed() > self.window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= self.max_requests {
            return false;
        }

        entry.requests += 1;
        true
    }

    /// Forget clients whose window has long passed
    pub fn cleanup(&self) {
        let window = self.window;
        self.entries
            .retain(|_, entry| entry.window_start.elapsed() <= window * 2);
    }

    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }
}

/// Axum middleware rejecting clients over their request budget
pub async fn rate_limit<S: Storage + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&request);

    if !state.rate_limiter.check(&client) {
        counter!(RATE_LIMITED).increment(1);
        tracing::debug!(client = %client, path = %request.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimitExceeded);
    }

    Ok(next.run(request).await)
}

/// Client address from `x-real-ip` (set by the proxy), else the peer address
fn client_key<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
