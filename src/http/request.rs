//! Per-request values attached by the filter chain.

use std::collections::HashMap;

use axum::http::{header::COOKIE, HeaderMap, Request};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Assigns a UUID v4 to requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        Uuid::new_v4().to_string().parse().ok().map(RequestId::new)
    }
}

/// The sanitized JSON or form body, as handlers should see it. Form bodies
/// are represented as an object of strings (arrays for repeated keys).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Cookies sent with the request, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(pub HashMap<String, String>);

impl Cookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for value in headers.get_all(COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            for pair in value.split(';') {
                let Some((name, value)) = pair.split_once('=') else { continue };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                // First occurrence wins.
                cookies.entry(name.to_string()).or_insert_with(|| decode_value(value));
            }
        }
        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// Percent-decode a cookie value, keeping it raw when it does not decode
/// to UTF-8.
fn decode_value(value: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
