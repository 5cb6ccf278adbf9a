//! Fixed-window rate limiting per client address.
//!
//! Each client gets a counter and a window start. The first request after
//! the window elapses starts a new window. Counting happens under the
//! map's per-key lock, so concurrent requests from one client are never
//! undercounted.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::client_ip::ClientIp;

/// Body of the 429 response.
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Key used when no client address could be resolved.
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset: Duration },
    Limited { reset: Duration },
}

/// State for the fixed-window limiter.
pub struct RateLimiterState {
    windows: DashMap<IpAddr, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiterState {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_millis(config.window_ms))
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    /// Count a request from `client` now.
    pub fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Count a request from `client` at `now`.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let mut entry = self.windows.entry(client).or_insert(Window {
            count: 0,
            started: now,
        });
        let window = entry.value_mut();

        if now.duration_since(window.started) >= self.window {
            window.count = 0;
            window.started = now;
        }
        let reset = self.window.saturating_sub(now.duration_since(window.started));

        if window.count < self.max_requests {
            window.count += 1;
            Decision::Allowed {
                remaining: self.max_requests - window.count,
                reset,
            }
        } else {
            Decision::Limited { reset }
        }
    }

    /// Drop windows that have elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients with a live window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Periodically sweep expired windows until shutdown.
pub fn spawn_sweeper(
    state: Arc<RateLimiterState>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = state.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = state.tracked_clients(), "Swept rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    })
}

fn reset_secs(reset: Duration) -> u64 {
    reset.as_millis().div_ceil(1000) as u64
}

fn apply_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    headers.insert("ratelimit-limit", HeaderValue::from(limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_secs(reset)));
}

/// Rate limiting stage. Keys on [`ClientIp`].
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ClientIp>()
        .map(|ClientIp(ip)| *ip)
        .unwrap_or(UNKNOWN_CLIENT);

    match state.check(client) {
        Decision::Allowed { remaining, reset } => {
            let mut response = next.run(request).await;
            apply_headers(response.headers_mut(), state.limit(), remaining, reset);
            response
        }
        Decision::Limited { reset } => {
            tracing::warn!(client = %client, "Rate limit exceeded");
            metrics::record_rejection("rate_limit");
            let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE).into_response();
            let headers = response.headers_mut();
            apply_headers(headers, state.limit(), 0, reset);
            headers.insert(RETRY_AFTER, HeaderValue::from(reset_secs(reset)));
            response
        }
    }
}
