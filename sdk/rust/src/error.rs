//! Errors surfaced by the gateway.

use thiserror::Error;

/// A failed call. Duplicate submissions and forced logouts are not errors;
/// they come back as [`crate::Outcome`] values.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response (connect, DNS, reset...).
    #[error("Error: {0}")]
    Network(String),

    /// The backend answered with a non-success status or an unreadable body.
    #[error("Error Code: {code}\nMessage: {message}")]
    Status { code: u16, message: String },

    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl GatewayError {
    /// HTTP status code, when the backend answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}
