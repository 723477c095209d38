//! Credit assessment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::models::money;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CreditAssessment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub requested_amount_cents: i64,
    pub term_months: i32,
    pub monthly_income_cents: i64,
    pub monthly_debt_cents: i64,
    pub installment_cents: i64,
    /// Debt-to-income in basis points (4300 = 43 %)
    pub debt_to_income_bps: i32,
    pub score: i32,
    pub decision: String,
    pub reasons: serde_json::Value,
    pub approval_request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CreditDecision {
    Approved,
    Referred,
    Declined,
}

/// # JSON Example
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "requested_amount_cents": 1500000,
///   "term_months": 36,
///   "monthly_income_cents": 520000,
///   "monthly_debt_cents": 45000
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreditAssessmentRequest {
    pub customer_id: Uuid,
    pub requested_amount_cents: i64,
    pub term_months: i32,
    pub monthly_income_cents: i64,
    #[serde(default)]
    pub monthly_debt_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct AssessmentListQuery {
    pub customer_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreditAssessmentResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub requested_amount: String,
    pub term_months: i32,
    pub installment: String,
    /// Ratio as a decimal string, e.g. "0.3125"
    pub debt_to_income: String,
    pub score: i32,
    pub decision: String,
    pub reasons: serde_json::Value,
    pub approval_request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<CreditAssessment> for CreditAssessmentResponse {
    fn from(a: CreditAssessment) -> Self {
        Self {
            id: a.id,
            customer_id: a.customer_id,
            requested_amount: money::cents_to_string(a.requested_amount_cents),
            term_months: a.term_months,
            installment: money::cents_to_string(a.installment_cents),
            debt_to_income: rust_decimal::Decimal::new(i64::from(a.debt_to_income_bps), 4)
                .to_string(),
            score: a.score,
            decision: a.decision,
            reasons: a.reasons,
            approval_request_id: a.approval_request_id,
            created_at: a.created_at,
        }
    }
}
