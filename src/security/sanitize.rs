//! Body parsing and query-operator sanitization.
//!
//! # Responsibilities
//! - Buffer and parse JSON and urlencoded bodies (bounded)
//! - Drop every key that could smuggle a document-query operator: keys
//!   starting with `$` or containing `.`, at any depth
//! - Apply the same rule to query string pairs
//! - Parse cookies
//! - Serve public files before anything else sees the request
//!
//! Handlers downstream receive the sanitized body bytes and the parsed value
//! as a [`ParsedBody`] extension. Other content types (multipart uploads)
//! pass through unread.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        uri::PathAndQuery,
        HeaderMap, HeaderValue, Request, StatusCode, Uri,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::http::request::{Cookies, ParsedBody};
use crate::http::response::ApiResponse;
use crate::http::static_files::PublicFiles;
use crate::observability::metrics;

/// Configuration for the parsing stage.
#[derive(Debug, Clone)]
pub struct BodyParsingState {
    pub max_body_size: usize,
    pub public_files: PublicFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

impl BodyKind {
    fn from_headers(headers: &HeaderMap) -> Self {
        let essence = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase());
        match essence.as_deref() {
            Some("application/json") => BodyKind::Json,
            Some("application/x-www-form-urlencoded") => BodyKind::Form,
            _ => BodyKind::Other,
        }
    }
}

/// True for keys that must never reach a query builder.
pub fn is_prohibited_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Like [`is_prohibited_key`], but also inspects bracket segments such as
/// `owner[$ne]`, which some query-string parsers expand into nested objects.
pub fn is_prohibited_param(key: &str) -> bool {
    key.split(['[', ']'])
        .filter(|segment| !segment.is_empty())
        .any(is_prohibited_key)
}

/// Remove prohibited keys from `value` in place, recursing through objects
/// and arrays. Returns how many keys were dropped.
pub fn sanitize_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_prohibited_key(key));
            let mut removed = before - map.len();
            for nested in map.values_mut() {
                removed += sanitize_value(nested);
            }
            removed
        }
        Value::Array(items) => items.iter_mut().map(sanitize_value).sum(),
        _ => 0,
    }
}

/// Drop prohibited pairs. Returns the kept pairs and the number dropped.
pub fn sanitize_pairs(pairs: Vec<(String, String)>) -> (Vec<(String, String)>, usize) {
    let before = pairs.len();
    let kept: Vec<_> = pairs
        .into_iter()
        .filter(|(key, _)| !is_prohibited_param(key))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Rewrite a query string without prohibited pairs. `None` when nothing
/// had to change.
pub fn sanitize_query(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes()).into_owned().collect();
    let (kept, removed) = sanitize_pairs(pairs);
    (removed > 0).then(|| encode_pairs(&kept))
}

/// Form pairs as a JSON object; repeated keys collect into arrays.
pub fn pairs_to_value(pairs: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(key) {
            None => {
                map.insert(key.clone(), Value::String(value.clone()));
            }
            Some(Value::Array(items)) => items.push(Value::String(value.clone())),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value.clone())]);
            }
        }
    }
    Value::Object(map)
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn rewrite_query(uri: &Uri, query: &str) -> Option<Uri> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>().ok()?);
    Uri::from_parts(parts).ok()
}

/// Parse a buffered body. Errors are ready-made rejection responses.
fn parse_body(kind: BodyKind, bytes: &[u8]) -> Result<(Value, Option<Vec<u8>>), ApiResponse> {
    match kind {
        BodyKind::Json => {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok((Value::Object(Map::new()), None));
            }
            let mut value: Value = serde_json::from_slice(bytes)
                .map_err(|_| ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid request body"))?;
            // Only objects and arrays are accepted as top-level JSON bodies.
            if !value.is_object() && !value.is_array() {
                return Err(ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid request body"));
            }
            let removed = sanitize_value(&mut value);
            let rewritten = (removed > 0).then(|| value.to_string().into_bytes());
            if removed > 0 {
                tracing::warn!(removed, "Stripped operator keys from JSON body");
            }
            Ok((value, rewritten))
        }
        BodyKind::Form => {
            let pairs: Vec<(String, String)> = form_urlencoded::parse(bytes).into_owned().collect();
            let (kept, removed) = sanitize_pairs(pairs);
            if removed > 0 {
                tracing::warn!(removed, "Stripped operator keys from form body");
            }
            let rewritten = (removed > 0).then(|| encode_pairs(&kept).into_bytes());
            Ok((pairs_to_value(&kept), rewritten))
        }
        BodyKind::Other => Ok((Value::Null, None)),
    }
}

fn too_large() -> Response {
    metrics::record_rejection("body_limit");
    ApiResponse::error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

/// True when `err` came from the body exceeding its length limit.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// 413 for an oversized body, 400 for any other read failure.
fn body_read_rejection(err: &axum::Error) -> Response {
    if is_length_limit(err) {
        return too_large();
    }
    tracing::warn!(error = %err, "Failed to read request body");
    metrics::record_rejection("body_read");
    ApiResponse::error(StatusCode::BAD_REQUEST, "Invalid request body").into_response()
}

/// Parsing/sanitization stage.
pub async fn parse_body_middleware(
    State(state): State<BodyParsingState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let kind = BodyKind::from_headers(&parts.headers);

    let body = if kind == BodyKind::Other {
        body
    } else {
        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > state.max_body_size) {
            return too_large();
        }

        let bytes = match to_bytes(body, state.max_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => return body_read_rejection(&e),
        };

        match parse_body(kind, &bytes) {
            Ok((value, rewritten)) => {
                parts.extensions.insert(ParsedBody(value));
                match rewritten {
                    Some(clean) => {
                        parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(clean.len()));
                        Body::from(clean)
                    }
                    None => Body::from(bytes),
                }
            }
            Err(rejection) => {
                tracing::warn!(path = %parts.uri.path(), "Rejected malformed body");
                metrics::record_rejection("body_parse");
                return rejection.into_response();
            }
        }
    };

    let cookies = Cookies::from_headers(&parts.headers);
    parts.extensions.insert(cookies);

    if let Some(clean) = parts.uri.query().and_then(sanitize_query) {
        tracing::warn!(path = %parts.uri.path(), "Stripped operator keys from query string");
        if let Some(uri) = rewrite_query(&parts.uri, &clean) {
            parts.uri = uri;
        }
    }

    let request = Request::from_parts(parts, body);
    if let Some(response) = state.public_files.try_serve(&request).await {
        return response;
    }

    next.run(request).await
}
