//! Audit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AuditLog {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    /// Label of the API key that performed the action
    pub actor: String,
    /// Dotted verb, e.g. `card.suspended`
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Filters for `GET /api/v1/audit-logs`. All are optional and combined with AND.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuditLogFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
