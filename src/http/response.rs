//! The JSON envelope every gateway-produced response uses.
//!
//! Business routes use the same envelope, including the two shapes that end
//! a client session (`statusCode: 700`, `logoutstatus: true`). Those are
//! sent with HTTP 200: the client only inspects envelopes of successful
//! responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pet_report_client::protocol::SESSION_EXPIRED_STATUS_CODE;
use serde::Serialize;

pub const WELCOME_MESSAGE: &str = "Welcome to pet missing report management backend application.";
pub const ACCESS_DENIED_MESSAGE: &str = "Access Denied";
pub const NOT_FOUND_MESSAGE: &str = "Not found";

/// `{"status": bool, "message": string}` plus optional session flags.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: bool,
    pub message: String,
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(rename = "logoutstatus", skip_serializing_if = "std::ops::Not::not")]
    pub logout: bool,
    #[serde(skip)]
    http_status: StatusCode,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            status_code: None,
            logout: false,
            http_status: StatusCode::OK,
        }
    }

    pub fn error(http_status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            status_code: None,
            logout: false,
            http_status,
        }
    }

    /// The expiry sentinel: the client wipes its session and reloads.
    pub fn session_expired() -> Self {
        Self {
            status_code: Some(SESSION_EXPIRED_STATUS_CODE),
            ..Self::error(StatusCode::OK, "Session expired")
        }
    }

    /// Forced logout: the client wipes its session and shows the sign-in view.
    pub fn logout() -> Self {
        Self {
            logout: true,
            ..Self::error(StatusCode::OK, "Session expired")
        }
    }

    pub fn welcome() -> Self {
        Self::ok(WELCOME_MESSAGE)
    }

    pub fn access_denied() -> Self {
        Self::error(StatusCode::FORBIDDEN, ACCESS_DENIED_MESSAGE)
    }

    pub fn not_found() -> Self {
        Self::error(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    pub fn http_status(&self) -> StatusCode {
        self.http_status
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.http_status, Json(self)).into_response()
    }
}
