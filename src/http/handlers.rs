//! Handlers owned by the gateway itself.

use crate::http::response::ApiResponse;

/// `GET /`
pub async fn welcome() -> ApiResponse {
    ApiResponse::welcome()
}

pub async fn not_found() -> ApiResponse {
    ApiResponse::not_found()
}
