//! Pet report gateway library.
//!
//! The request boundary of the pet missing report backend: an ordered
//! ingress filter chain in front of the business routes.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
