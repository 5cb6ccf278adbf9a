//! User-agent blocklist.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::USER_AGENT, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::UserAgentConfig;
use crate::http::response::ApiResponse;
use crate::observability::metrics;
use crate::security::client_ip::ClientIp;

/// Exact user-agent strings refused with 403.
#[derive(Debug, Clone, Default)]
pub struct UserAgentBlocklist {
    blocked: Arc<HashSet<String>>,
}

impl UserAgentBlocklist {
    pub fn from_config(config: &UserAgentConfig) -> Self {
        Self {
            blocked: Arc::new(config.blocked.iter().cloned().collect()),
        }
    }

    /// Exact, case-sensitive match. A missing header never matches.
    pub fn is_blocked(&self, user_agent: Option<&str>) -> bool {
        user_agent.is_some_and(|ua| self.blocked.contains(ua))
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// User-agent blocklist stage.
pub async fn user_agent_middleware(
    State(blocklist): State<UserAgentBlocklist>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok());

    if blocklist.is_blocked(user_agent) {
        let client = request.extensions().get::<ClientIp>().map(|ClientIp(ip)| *ip);
        tracing::warn!(user_agent = ?user_agent, client = ?client, "Blocked user agent");
        metrics::record_rejection("user_agent");
        return ApiResponse::access_denied().into_response();
    }

    next.run(request).await
}
