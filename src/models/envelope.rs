//! Uniform response envelope.
//!
//! Every endpoint answers with the same shape so clients can branch on
//! `success` without inspecting HTTP status codes:
//!
//! ```json
//! {
//!   "success": true,
//!   "message": "Account opened",
//!   "data": { "id": "550e8400-e29b-41d4-a716-446655440000" },
//!   "error": null
//! }
//! ```

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Failed response; `code` is the machine-readable error identifier.
    pub fn failure(message: impl Into<String>, code: &str) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(code.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_serializes_all_fields() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2], "Listed")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "message": "Listed",
                "data": [1, 2],
                "error": null
            })
        );
    }

    #[test]
    fn failure_envelope_has_no_data() {
        let json = serde_json::to_value(ApiResponse::<()>::failure("nope", "conflict")).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert_eq!(json["error"], "conflict");
    }
}
