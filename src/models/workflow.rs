//! Approval requests and their routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::models::{api_key::Role, money};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub request_type: String,
    pub entity_id: Option<Uuid>,
    pub amount_cents: Option<i64>,
    pub required_role: String,
    pub status: String,
    /// Data needed to carry out the approved action (e.g. a transfer request)
    pub payload: Option<serde_json::Value>,
    pub requested_by: Uuid,
    pub decided_by: Option<Uuid>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestType {
    LargeTransfer,
    CreditReferral,
    AccountClosure,
    LimitOverride,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A request waiting to be stored; built by the services that need approval.
#[derive(Debug, Clone)]
pub struct NewApprovalRequest {
    pub request_type: RequestType,
    pub entity_id: Option<Uuid>,
    pub amount_cents: Option<i64>,
    pub payload: Option<serde_json::Value>,
}

/// Body for `POST /api/v1/workflows` (manual submissions).
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub request_type: RequestType,
    pub entity_id: Option<Uuid>,
    pub amount_cents: Option<i64>,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkflowListQuery {
    pub status: Option<ApprovalStatus>,
    pub required_role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub id: Uuid,
    pub request_type: String,
    pub entity_id: Option<Uuid>,
    pub amount: Option<String>,
    pub required_role: String,
    pub status: String,
    pub requested_by: Uuid,
    pub decided_by: Option<Uuid>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl From<ApprovalRequest> for ApprovalResponse {
    fn from(r: ApprovalRequest) -> Self {
        Self {
            id: r.id,
            request_type: r.request_type,
            entity_id: r.entity_id,
            amount: r.amount_cents.map(money::cents_to_string),
            required_role: r.required_role,
            status: r.status,
            requested_by: r.requested_by,
            decided_by: r.decided_by,
            decision_note: r.decision_note,
            created_at: r.created_at,
            decided_at: r.decided_at,
        }
    }
}
