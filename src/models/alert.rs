//! Operational alerts raised by services and worked by back-office staff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Alert {
    pub id: Uuid,
    #[serde(skip)]
    pub tenant_id: Uuid,
    pub alert_type: String,
    pub severity: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertType {
    CardBlocked,
    ReconciliationMismatch,
    LargeTransferPending,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (AlertStatus::Open, AlertStatus::Acknowledged)
                | (AlertStatus::Open, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListQuery {
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
}

/// One row of the alert aggregation view.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AlertGroup {
    pub alert_type: String,
    pub severity: String,
    pub open_count: i64,
    pub total_count: i64,
    pub latest_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_alerts_stay_resolved() {
        assert!(AlertStatus::Open.can_transition_to(AlertStatus::Acknowledged));
        assert!(AlertStatus::Acknowledged.can_transition_to(AlertStatus::Resolved));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Open));
        assert!(!AlertStatus::Acknowledged.can_transition_to(AlertStatus::Acknowledged));
    }
}
