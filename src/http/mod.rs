//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → security::* (ingress filter chain)
//!     → handlers.rs / static_files.rs / embedded user routes
//!     → response.rs (JSON envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::{Cookies, ParsedBody, X_REQUEST_ID};
pub use response::ApiResponse;
pub use server::{HttpServer, ServerError};
