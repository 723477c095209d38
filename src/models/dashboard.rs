//! Admin dashboard DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub total: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardOverview {
    pub customer_count: i64,
    pub accounts_by_status: Vec<StatusCount>,
    pub deposits_by_currency: Vec<CurrencyTotal>,
    pub cards_by_status: Vec<StatusCount>,
    pub pending_approvals: i64,
    pub open_alerts_by_severity: Vec<StatusCount>,
    pub transactions_last_24h: i64,
    pub volume_last_24h: Vec<CurrencyTotal>,
    pub generated_at: DateTime<Utc>,
}
