//! Branch records and branch-level cash operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::models::money;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Branch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub city: String,
    pub status: String,
    pub cash_on_hand_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BranchStatus {
    Open,
    Closed,
}

#[derive(Debug, Deserialize)]
pub struct CreateBranchRequest {
    pub code: String,
    pub name: String,
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct BranchStatusRequest {
    pub status: BranchStatus,
}

/// Positive deltas add cash to the vault, negative ones remove it.
#[derive(Debug, Deserialize)]
pub struct CashAdjustmentRequest {
    pub delta_cents: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BranchResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub city: String,
    pub status: String,
    pub cash_on_hand: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            code: branch.code,
            name: branch.name,
            city: branch.city,
            status: branch.status,
            cash_on_hand: money::cents_to_string(branch.cash_on_hand_cents),
            created_at: branch.created_at,
            updated_at: branch.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BranchSummary {
    pub branch: BranchResponse,
    pub customer_count: i64,
    pub account_count: i64,
    pub total_deposits: String,
}
