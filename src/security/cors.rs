//! Origin check and CORS response headers.
//!
//! The stage never rejects on origin: an unknown origin only loses the
//! `Access-Control-Allow-Origin` header, and the browser enforces the rest.
//! Preflights are answered here with `204` and go no further.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
        },
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;

/// Immutable CORS policy shared by all requests.
#[derive(Debug, Clone)]
pub struct CorsState {
    allowed_origins: Arc<HashSet<String>>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    allow_credentials: bool,
}

impl CorsState {
    pub fn from_config(config: &CorsConfig) -> Result<Self, axum::http::header::InvalidHeaderValue> {
        Ok(Self {
            allowed_origins: Arc::new(config.allowed_origins.iter().cloned().collect()),
            allow_methods: HeaderValue::from_str(&config.allowed_methods)?,
            allow_headers: HeaderValue::from_str(&config.allowed_headers)?,
            allow_credentials: config.allow_credentials,
        })
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin)
    }

    /// The origin to echo back, if the request carries an allowed one.
    fn echoed_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        headers
            .get(ORIGIN)
            .filter(|origin| origin.to_str().is_ok_and(|o| self.is_allowed(o)))
            .cloned()
    }

    fn apply(&self, headers: &mut HeaderMap, origin: Option<HeaderValue>) {
        if let Some(origin) = origin {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
    }
}

/// Origin/CORS stage. Outermost filter of the chain.
pub async fn cors_middleware(
    State(state): State<CorsState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = state.echoed_origin(request.headers());
    if origin.is_none() {
        if let Some(declared) = request.headers().get(ORIGIN) {
            tracing::debug!(origin = ?declared, "Origin not in allow list");
        }
    }

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    state.apply(response.headers_mut(), origin);
    response
}
