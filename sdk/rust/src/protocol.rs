//! Wire-level conventions shared with the backend.
//!
//! The backend reports application outcomes inside a JSON envelope
//! (`{"status": bool, "message": ...}`), independently of the HTTP status.
//! Two envelope shapes end the user's session:
//!
//! - `statusCode: 700` with a falsy `status` (the expiry sentinel)
//! - a truthy `logoutstatus`

use serde_json::{json, Value};

/// Envelope `statusCode` the backend uses to report an expired session.
pub const SESSION_EXPIRED_STATUS_CODE: u16 = 700;

/// Message resolved for a JSON post suppressed as a duplicate.
pub const DUPLICATE_REQUEST_MESSAGE: &str = "Your request is already in process";

/// Notification shown when the backend forces a logout.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your login session has expired. Please re-login.";

/// Envelope resolved in place of a duplicate JSON post.
pub fn duplicate_request_response() -> Value {
    json!({ "status": false, "message": DUPLICATE_REQUEST_MESSAGE })
}

/// True for the expiry sentinel: falsy `status` and `statusCode == 700`.
pub fn is_session_expired(body: &Value) -> bool {
    !is_truthy(&body["status"])
        && body["statusCode"].as_f64() == Some(f64::from(SESSION_EXPIRED_STATUS_CODE))
}

/// True when the envelope carries a truthy `logoutstatus`.
pub fn is_logout(body: &Value) -> bool {
    is_truthy(&body["logoutstatus"])
}

/// Loose truthiness used by the envelope flags. The backend is not strict
/// about sending booleans, so `1` and `"yes"` count as set.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
