//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and the failure envelope.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::envelope::ApiResponse;

/// Application-wide error type.
///
/// Every service returns `Result<T, AppError>`; the HTTP edge turns the
/// error into a failure envelope exactly once.
///
/// # Error Categories
///
/// - **Database / Crypto**: infrastructure failures, never shown to clients
/// - **Authentication / Authorization**: invalid API key, missing role
/// - **Resource Errors**: requested rows not found in the caller's tenant
/// - **Business Logic Errors**: operations that violate business rules
/// - **External Errors**: the 3DS gateway or SMS provider failed
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Authenticated, but the key's role may not perform this operation.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Insufficient permissions")]
    Forbidden,

    /// Requested entity does not exist or belongs to another tenant.
    ///
    /// Returns HTTP 404 Not Found. The payload names the entity ("Account", "Card", ...).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Account has insufficient balance for the requested operation.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// The request collides with existing data (duplicate email, card, branch code).
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    Conflict(String),

    /// The entity is in a state that does not allow the operation.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("{0}")]
    InvalidState(String),

    /// An external collaborator (3DS gateway, SMS provider) failed.
    ///
    /// Returns HTTP 502 Bad Gateway.
    #[error("External service error: {0}")]
    External(String),

    /// Encryption, decryption or integrity verification failed.
    ///
    /// Returns HTTP 500 Internal Server Error (hides details from client).
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Rendering a PDF or CSV document failed.
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Document error: {0}")]
    Document(String),
}

impl AppError {
    /// Stable machine-readable code placed in the envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Crypto(_) | AppError::Document(_) => "internal_error",
            AppError::InvalidApiKey => "invalid_api_key",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::InsufficientBalance => "insufficient_balance",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidState(_) => "invalid_state",
            AppError::External(_) => "external_service_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Crypto(_) | AppError::Document(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientBalance => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Shorthand for the most common validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidRequest(message.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "message": "Account not found",
///   "data": null,
///   "error": "not_found"
/// }
/// ```
///
/// Database, crypto and document failures are logged here and replaced with a
/// generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("database error: {:?}", e);
                "An internal error occurred".to_string()
            }
            AppError::Crypto(ref e) => {
                tracing::error!("crypto error: {}", e);
                "An internal error occurred".to_string()
            }
            AppError::Document(ref e) => {
                tracing::error!("document error: {}", e);
                "An internal error occurred".to_string()
            }
            AppError::External(ref e) => {
                tracing::warn!("external service error: {}", e);
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(ApiResponse::<()>::failure(message, self.code()));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_names_the_entity() {
        let (status, body) = body_json(AppError::NotFound("Card")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Card not found");
        assert_eq!(body["error"], "not_found");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(AppError::Crypto("tag mismatch".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
        assert_eq!(body["error"], "internal_error");

        let (status, body) = body_json(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn business_errors_keep_their_message() {
        let (status, body) =
            body_json(AppError::InvalidState("Card is already active".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Card is already active");
        assert_eq!(body["error"], "invalid_state");

        let (status, _) = body_json(AppError::InsufficientBalance).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = body_json(AppError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
