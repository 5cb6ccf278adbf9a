//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway's own routes
//! - Wire the ingress filter chain in its fixed order
//! - Mount uploads and the embedding application's user routes
//! - Run with graceful shutdown, alongside the rate-limit sweeper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::InvalidHeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::http::static_files::{uploads_service, PublicFiles};
use crate::lifecycle::shutdown::wait_for;
use crate::observability::metrics;
use crate::security::cors::{cors_middleware, CorsState};
use crate::security::headers::{security_headers_middleware, SecurityHeadersState};
use crate::security::rate_limit::{rate_limit_middleware, spawn_sweeper, RateLimiterState};
use crate::security::sanitize::{parse_body_middleware, BodyParsingState};
use crate::security::client_ip::identify_client_middleware;
use crate::security::user_agent::{user_agent_middleware, UserAgentBlocklist};

/// Error type for server construction and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid header value in configuration: {0}")]
    Header(#[from] InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the pet report backend.
pub struct HttpServer {
    config: GatewayConfig,
    cors: CorsState,
    blocklist: UserAgentBlocklist,
    rate_limiter: Option<Arc<RateLimiterState>>,
    user_routes: Option<Router>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let cors = CorsState::from_config(&config.cors)?;
        let blocklist = UserAgentBlocklist::from_config(&config.user_agents);
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiterState::from_config(&config.rate_limit)));

        Ok(Self {
            config,
            cors,
            blocklist,
            rate_limiter,
            user_routes: None,
        })
    }

    /// Mount the business routes served under `/v1/users`.
    pub fn with_user_routes(mut self, routes: Router) -> Self {
        self.user_routes = Some(routes);
        self
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The shared limiter, when rate limiting is enabled.
    pub fn rate_limiter(&self) -> Option<Arc<RateLimiterState>> {
        self.rate_limiter.clone()
    }

    /// Build the complete application: routes wrapped in the filter chain.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let mut routes = Router::new()
            .route("/", get(handlers::welcome))
            .nest_service("/uploads", uploads_service(&self.config.static_files.uploads_dir))
            .fallback(handlers::not_found);
        if let Some(user_routes) = &self.user_routes {
            routes = routes.nest("/v1/users", user_routes.clone());
        }

        // Innermost stage first: the limiter only sees requests that
        // survived every earlier stage.
        if let Some(limiter) = &self.rate_limiter {
            routes = routes.layer(from_fn_with_state(limiter.clone(), rate_limit_middleware));
        }

        let parsing = BodyParsingState {
            max_body_size: self.config.security.max_body_size,
            public_files: PublicFiles::new(&self.config.static_files.public_dir),
        };
        let headers = SecurityHeadersState {
            enabled: self.config.security.enable_headers,
        };

        routes.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(from_fn(metrics::track_requests))
                .layer(from_fn_with_state(self.cors.clone(), cors_middleware))
                .layer(from_fn_with_state(headers, security_headers_middleware))
                // Inside cors and headers so a 408 still carries both.
                .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
                .layer(from_fn_with_state(parsing, parse_body_middleware))
                .layer(from_fn(identify_client_middleware))
                .layer(from_fn_with_state(self.blocklist.clone(), user_agent_middleware)),
        )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            allowed_origins = self.config.cors.allowed_origins.len(),
            blocked_user_agents = self.blocklist.len(),
            rate_limit = ?self.rate_limiter.as_ref().map(|l| l.limit()),
            "HTTP server starting"
        );

        if let Some(limiter) = &self.rate_limiter {
            spawn_sweeper(
                limiter.clone(),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                shutdown.resubscribe(),
            );
        }

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
