//! Audit log search.

use axum::{Extension, extract::State};

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::Query, respond},
    middleware::auth::AuthContext,
    models::audit::{AuditLog, AuditLogFilter},
    services::audit_service,
};

/// `GET /api/v1/audit-logs`
///
/// # Query Parameters
///
/// `actor`, `action` (a trailing `.` matches a prefix, e.g. `card.`),
/// `entity_type`, `entity_id`, `from`, `to` (RFC 3339), `limit`, `offset`.
pub async fn list_audit_logs(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<AuditLogFilter>,
) -> ApiResult<Vec<AuditLog>> {
    let logs = audit_service::list_audit_logs(&pool, &auth, &filter).await?;
    respond(logs, "Audit logs retrieved")
}
