//! Credit assessment.
//!
//! A request is priced with a standard amortized installment, scored with a
//! simple points table and decided. Referred applications open a
//! `credit_referral` approval request routed by amount.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy, prelude::ToPrimitive};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        api_key::Role,
        credit::{CreditAssessment, CreditAssessmentRequest, CreditDecision},
        customer::KycStatus,
        workflow::{NewApprovalRequest, RequestType},
    },
    services::{audit_service, customer_service, workflow_service},
};

const BASE_SCORE: i32 = 600;
const MIN_SCORE: i32 = 300;
const MAX_SCORE: i32 = 850;
const APPROVAL_SCORE: i32 = 680;
const REFERRAL_SCORE: i32 = 600;

/// DTI bands, as fractions of monthly income
const DTI_EXCELLENT: Decimal = Decimal::from_parts(20, 0, 0, false, 2);
const DTI_GOOD: Decimal = Decimal::from_parts(36, 0, 0, false, 2);
const DTI_MAX: Decimal = Decimal::from_parts(43, 0, 0, false, 2);

pub const REASON_KYC_NOT_VERIFIED: &str = "kyc_not_verified";
pub const REASON_HIGH_DTI: &str = "high_debt_to_income";
pub const REASON_LOW_DEPOSITS: &str = "insufficient_deposits";
pub const REASON_NEW_CUSTOMER: &str = "short_customer_history";
pub const REASON_AMOUNT_VS_INCOME: &str = "amount_exceeds_income_multiple";

/// Monthly installment in cents for `principal_cents` over `term_months`.
///
/// `P * r / (1 - (1 + r)^-n)` with `r` the monthly rate; a zero rate
/// spreads the principal evenly.
pub fn monthly_installment(principal_cents: i64, term_months: i32, annual_rate_bps: u32) -> Option<i64> {
    if term_months <= 0 {
        return None;
    }

    let principal = Decimal::from(principal_cents);
    let months = Decimal::from(term_months);
    let rate = Decimal::from(annual_rate_bps) / Decimal::from(10_000) / Decimal::from(12);

    let installment = if rate.is_zero() {
        principal / months
    } else {
        let growth = (Decimal::ONE + rate).checked_powi(i64::from(term_months))?;
        principal * rate * growth / (growth - Decimal::ONE)
    };

    installment
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// `(debt + installment) / income`, unrounded.
pub fn debt_to_income(monthly_debt_cents: i64, installment_cents: i64, monthly_income_cents: i64) -> Option<Decimal> {
    if monthly_income_cents <= 0 {
        return None;
    }

    let obligations = Decimal::from(monthly_debt_cents) + Decimal::from(installment_cents);
    obligations.checked_div(Decimal::from(monthly_income_cents))
}

/// A ratio in whole basis points, for storage only. Scoring compares the exact ratio.
pub fn to_basis_points(ratio: Decimal) -> Option<i64> {
    (ratio * Decimal::from(10_000))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Everything the points table looks at.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub kyc_verified: bool,
    pub dti: Decimal,
    pub installment_cents: i64,
    pub total_deposits_cents: i64,
    pub customer_days: i64,
    pub requested_amount_cents: i64,
    pub monthly_income_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scorecard {
    pub score: i32,
    pub decision: CreditDecision,
    pub reasons: Vec<&'static str>,
}

pub fn score(input: &ScoringInput) -> Scorecard {
    let mut score = BASE_SCORE;
    let mut reasons = Vec::new();

    match input.dti {
        dti if dti < DTI_EXCELLENT => score += 120,
        dti if dti < DTI_GOOD => score += 60,
        dti if dti < DTI_MAX => {}
        _ => {
            score -= 100;
            reasons.push(REASON_HIGH_DTI);
        }
    }

    if input.total_deposits_cents >= input.installment_cents.saturating_mul(3) {
        score += 50;
    } else {
        reasons.push(REASON_LOW_DEPOSITS);
    }

    if input.customer_days >= 365 {
        score += 30;
    } else {
        reasons.push(REASON_NEW_CUSTOMER);
    }

    if input.requested_amount_cents > input.monthly_income_cents.saturating_mul(10) {
        score -= 80;
        reasons.push(REASON_AMOUNT_VS_INCOME);
    }

    let score = score.clamp(MIN_SCORE, MAX_SCORE);

    let decision = if !input.kyc_verified {
        reasons.insert(0, REASON_KYC_NOT_VERIFIED);
        CreditDecision::Declined
    } else if score >= APPROVAL_SCORE && input.dti <= DTI_MAX {
        CreditDecision::Approved
    } else if score >= REFERRAL_SCORE {
        CreditDecision::Referred
    } else {
        CreditDecision::Declined
    };

    Scorecard { score, decision, reasons }
}

fn validate_request(request: &CreditAssessmentRequest) -> Result<(), AppError> {
    if !(6..=360).contains(&request.term_months) {
        return Err(AppError::invalid("Term must be between 6 and 360 months"));
    }
    if request.requested_amount_cents <= 0 {
        return Err(AppError::invalid("Requested amount must be positive"));
    }
    if request.monthly_income_cents <= 0 {
        return Err(AppError::invalid("Monthly income must be positive"));
    }
    if request.monthly_debt_cents < 0 {
        return Err(AppError::invalid("Monthly debt cannot be negative"));
    }
    Ok(())
}

fn customer_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(0)
}

/// Assess, store and audit a credit application.
///
/// # Access
///
/// Credit officers and the risk committee.
pub async fn assess_credit(
    pool: &DbPool,
    config: &Config,
    auth: &AuthContext,
    request: CreditAssessmentRequest,
) -> Result<CreditAssessment, AppError> {
    auth.require_any(&[Role::CreditOfficer, Role::RiskCommittee])?;
    validate_request(&request)?;

    let installment_cents = monthly_installment(
        request.requested_amount_cents,
        request.term_months,
        config.credit_annual_rate_bps,
    )
    .ok_or_else(|| AppError::invalid("Requested amount is too large to price"))?;

    let dti = debt_to_income(
        request.monthly_debt_cents,
        installment_cents,
        request.monthly_income_cents,
    )
    .ok_or_else(|| AppError::invalid("Debt-to-income ratio cannot be computed"))?;
    let dti_bps = to_basis_points(dti)
        .ok_or_else(|| AppError::invalid("Debt-to-income ratio is out of range"))?;

    let mut tx = pool.begin().await?;

    let customer =
        customer_service::fetch_customer(&mut *tx, auth.tenant_id, request.customer_id).await?;

    let total_deposits_cents: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(balance_cents), 0)::BIGINT
        FROM accounts
        WHERE customer_id = $1 AND tenant_id = $2 AND status <> 'closed'
        "#,
    )
    .bind(customer.id)
    .bind(auth.tenant_id)
    .fetch_one(&mut *tx)
    .await?;

    let scorecard = score(&ScoringInput {
        kyc_verified: customer.kyc_status == KycStatus::Verified.as_ref(),
        dti,
        installment_cents,
        total_deposits_cents,
        customer_days: customer_days(customer.created_at, Utc::now()),
        requested_amount_cents: request.requested_amount_cents,
        monthly_income_cents: request.monthly_income_cents,
    });

    let assessment_id = Uuid::new_v4();

    let approval_request_id = if scorecard.decision == CreditDecision::Referred {
        let referral = workflow_service::create(
            &mut *tx,
            auth,
            NewApprovalRequest {
                request_type: RequestType::CreditReferral,
                entity_id: Some(assessment_id),
                amount_cents: Some(request.requested_amount_cents),
                payload: Some(serde_json::json!({
                    "customer_id": customer.id,
                    "score": scorecard.score,
                    "reasons": scorecard.reasons,
                })),
            },
        )
        .await?;
        Some(referral.id)
    } else {
        None
    };

    let assessment = sqlx::query_as::<_, CreditAssessment>(
        r#"
        INSERT INTO credit_assessments (
            id, tenant_id, customer_id, requested_amount_cents, term_months,
            monthly_income_cents, monthly_debt_cents, installment_cents,
            debt_to_income_bps, score, decision, reasons, approval_request_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(assessment_id)
    .bind(auth.tenant_id)
    .bind(customer.id)
    .bind(request.requested_amount_cents)
    .bind(request.term_months)
    .bind(request.monthly_income_cents)
    .bind(request.monthly_debt_cents)
    .bind(installment_cents)
    .bind(i32::try_from(dti_bps).unwrap_or(i32::MAX))
    .bind(scorecard.score)
    .bind(scorecard.decision.as_ref())
    .bind(serde_json::json!(scorecard.reasons))
    .bind(approval_request_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "credit.assessed",
        "credit_assessment",
        Some(assessment.id),
        Some(serde_json::json!({
            "customer_id": customer.id,
            "decision": scorecard.decision,
            "score": scorecard.score,
        })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        "credit assessment {} for customer {}: {} (score {})",
        assessment.id,
        customer.id,
        assessment.decision,
        assessment.score
    );

    Ok(assessment)
}

pub async fn get_assessment(
    pool: &DbPool,
    auth: &AuthContext,
    assessment_id: Uuid,
) -> Result<CreditAssessment, AppError> {
    auth.require_any(&[Role::CreditOfficer, Role::RiskCommittee, Role::Auditor])?;

    sqlx::query_as::<_, CreditAssessment>(
        "SELECT * FROM credit_assessments WHERE id = $1 AND tenant_id = $2",
    )
    .bind(assessment_id)
    .bind(auth.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Credit assessment"))
}

/// Newest first.
pub async fn list_assessments(
    pool: &DbPool,
    auth: &AuthContext,
    customer_id: Uuid,
) -> Result<Vec<CreditAssessment>, AppError> {
    auth.require_any(&[Role::CreditOfficer, Role::RiskCommittee, Role::Auditor])?;

    let assessments = sqlx::query_as::<_, CreditAssessment>(
        r#"
        SELECT * FROM credit_assessments
        WHERE customer_id = $1 AND tenant_id = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(customer_id)
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(assessments)
}
