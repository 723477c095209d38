//! Health check endpoint for service monitoring.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    db::DbPool,
    handlers::{ApiResult, respond},
};

/// Health check response.
///
/// Returns service status and database connectivity.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Database connection status
    pub database: String,

    pub version: &'static str,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler. Public, no API key.
///
/// # Checks
///
/// - Database connectivity (executes simple query)
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "success": true,
///   "message": "Service healthy",
///   "data": {
///     "status": "healthy",
///     "database": "connected",
///     "version": "0.1.0",
///     "timestamp": "2025-12-21T19:00:00Z"
///   },
///   "error": null
/// }
/// ```
///
/// # Response (500 Internal Server Error)
///
/// If database is unreachable, returns the failure envelope.
pub async fn health_check(State(pool): State<DbPool>) -> ApiResult<HealthResponse> {
    // Verify database connectivity with simple query
    sqlx::query("SELECT 1").execute(&pool).await?;

    respond(
        HealthResponse {
            status: "healthy".to_string(),
            database: "connected".to_string(),
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        },
        "Service healthy",
    )
}
