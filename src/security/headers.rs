//! Security response headers.
//!
//! A fixed hardening set. Content-Security-Policy and the cross-origin
//! opener/embedder policies are not sent, and the resource
//! policy is `cross-origin` so the separately hosted frontend can load
//! uploaded images.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

/// Header name/value pairs added to every response past the CORS stage.
pub const HARDENING_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-resource-policy", "cross-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

#[derive(Debug, Clone, Copy)]
pub struct SecurityHeadersState {
    pub enabled: bool,
}

pub fn apply_hardening_headers(headers: &mut HeaderMap) {
    for &(name, value) in HARDENING_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    headers.remove("x-powered-by");
}

/// Security headers stage. Never rejects.
pub async fn security_headers_middleware(
    State(state): State<SecurityHeadersState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if state.enabled {
        apply_hardening_headers(response.headers_mut());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_headers_and_omits_disabled_policies() {
        let mut headers = HeaderMap::new();
        headers.insert("x-powered-by", HeaderValue::from_static("PHP/8.2"));
        apply_hardening_headers(&mut headers);

        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
        assert!(headers.get("content-security-policy").is_none());
        assert!(headers.get("cross-origin-opener-policy").is_none());
        assert!(headers.get("cross-origin-embedder-policy").is_none());
        assert!(headers.get("x-powered-by").is_none());
    }
}
