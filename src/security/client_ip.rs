//! Client address resolution.
//!
//! # Responsibilities
//! - Find the originating client address behind reverse proxies and CDNs
//! - Fall back to the socket peer address
//! - Attach the result as [`ClientIp`] for the stages that key on it
//!
//! Only values that parse as IP addresses are accepted, so a garbage header
//! falls through to the next candidate instead of becoming a limiter key.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

/// The resolved client address of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientIp(pub IpAddr);

/// Headers consulted in order. The first one yielding an address wins.
pub const FORWARDING_HEADERS: &[&str] = &[
    "x-client-ip",
    "x-forwarded-for",
    "cf-connecting-ip",
    "fastly-client-ip",
    "true-client-ip",
    "x-real-ip",
    "x-cluster-client-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Parse one address, tolerating ports, brackets and quotes.
fn parse_ip(candidate: &str) -> Option<IpAddr> {
    let candidate = candidate.trim().trim_matches('"');
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    // `[v6]` without a port
    candidate
        .strip_prefix('[')
        .and_then(|rest| rest.split(']').next())
        .and_then(|inner| inner.parse().ok())
}

/// `for=` parameters of an RFC 7239 `Forwarded` header, in order.
fn forwarded_for(value: &str) -> Option<IpAddr> {
    value
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case("for"))
        .find_map(|(_, value)| parse_ip(value))
}

fn from_header(name: &str, value: &str) -> Option<IpAddr> {
    match name {
        "forwarded" => forwarded_for(value),
        "x-forwarded-for" | "x-forwarded" | "forwarded-for" => value.split(',').find_map(parse_ip),
        _ => parse_ip(value),
    }
}

/// Resolve the client address from forwarding headers, then the peer.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    FORWARDING_HEADERS
        .iter()
        .find_map(|&name| {
            headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(|v| from_header(name, v))
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Identification stage.
pub async fn identify_client_middleware(mut request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match resolve_client_ip(request.headers(), peer) {
        Some(ip) => {
            request.extensions_mut().insert(ClientIp(ip));
        }
        None => tracing::debug!("Client address could not be resolved"),
    }

    next.run(request).await
}
