//! Security subsystem: the ingress filter chain.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (echo allowed origin, answer preflight)
//!     → headers.rs (hardening response headers)
//!     → sanitize.rs (parse bodies & cookies, strip operators, public files)
//!     → client_ip.rs (resolve client address)
//!     → user_agent.rs (blocklist, 403)
//!     → rate_limit.rs (per-client fixed window, 429)
//!     → Pass to routes
//! ```
//!
//! # Design Decisions
//! - Strict order; every rejecting stage answers and stops the chain
//! - Stages share nothing per request except request extensions
//! - The only mutable shared state is the rate limiter's window map

pub mod client_ip;
pub mod cors;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;
pub mod user_agent;

pub use client_ip::ClientIp;
pub use cors::CorsState;
pub use rate_limit::RateLimiterState;
pub use user_agent::UserAgentBlocklist;
