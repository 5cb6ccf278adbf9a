//! Client SDK for the pet report backend.
//!
//! Every outbound call goes through a single [`Gateway`], which owns bearer
//! token injection, duplicate-submission suppression for JSON posts and the
//! session-expiry handling shared by all views.
//!
//! # Data Flow
//! ```text
//! caller
//!     → guard.rs (single in-flight slot, JSON posts only)
//!     → client.rs (headers, transport, error mapping)
//!     → protocol.rs (sentinel / logout detection)
//!     → session.rs + navigation.rs (clear state, notify, redirect)
//!     → Outcome back to the caller
//! ```

pub mod client;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod protocol;
pub mod session;

pub use client::{ClientConfig, Gateway, GatewayBuilder, Outcome, RequestKind, RouteDecision};
pub use error::GatewayError;
pub use guard::{InFlightGuard, InFlightRequest};
pub use navigation::{AlertLevel, LogNavigator, LogNotifier, Navigator, Notifier};
pub use session::{MemorySessionStore, SessionCredential, SessionStore};
