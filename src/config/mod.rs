//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, PORT override)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to every filter stage
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; origin and user-agent sets never
//!   change while the process runs
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CorsConfig, GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    SecurityConfig, StaticFilesConfig, TimeoutConfig, UserAgentConfig,
};
