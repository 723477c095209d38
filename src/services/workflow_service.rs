//! Approval workflows.
//!
//! Operations that exceed an operator's authority are parked as approval
//! requests. Each request is routed to the role allowed to decide it; the
//! approval itself carries out the parked action in the same transaction.

use std::str::FromStr;

use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        api_key::Role,
        transaction::TransferRequest,
        workflow::{
            ApprovalRequest, ApprovalStatus, NewApprovalRequest, RequestType, SubmitRequest,
            WorkflowListQuery,
        },
    },
    services::{account_service, audit_service, transaction_service},
};

/// Monetary requests below this go to a supervisor.
const SUPERVISOR_LIMIT_CENTS: i64 = 1_000_000;
/// Monetary requests below this go to a branch manager; above, the risk committee.
const BRANCH_MANAGER_LIMIT_CENTS: i64 = 10_000_000;
/// Credit referrals at or above this skip the credit officer.
const CREDIT_OFFICER_LIMIT_CENTS: i64 = 5_000_000;

/// Role that must decide a request of this type and amount.
pub fn route(request_type: RequestType, amount_cents: Option<i64>) -> Role {
    let amount = amount_cents.unwrap_or(0);
    match request_type {
        RequestType::CreditReferral if amount >= CREDIT_OFFICER_LIMIT_CENTS => Role::RiskCommittee,
        RequestType::CreditReferral => Role::CreditOfficer,
        RequestType::AccountClosure => Role::BranchManager,
        RequestType::LargeTransfer | RequestType::LimitOverride => {
            if amount < SUPERVISOR_LIMIT_CENTS {
                Role::Supervisor
            } else if amount < BRANCH_MANAGER_LIMIT_CENTS {
                Role::BranchManager
            } else {
                Role::RiskCommittee
            }
        }
    }
}

/// Store a routed request. Callers pass their open transaction.
pub async fn create<'e, E>(
    executor: E,
    auth: &AuthContext,
    request: NewApprovalRequest,
) -> Result<ApprovalRequest, AppError>
where
    E: PgExecutor<'e>,
{
    let required_role = route(request.request_type, request.amount_cents);

    let created = sqlx::query_as::<_, ApprovalRequest>(
        r#"
        INSERT INTO approval_requests (
            tenant_id, request_type, entity_id, amount_cents, required_role, payload, requested_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(request.request_type.as_ref())
    .bind(request.entity_id)
    .bind(request.amount_cents)
    .bind(required_role.as_ref())
    .bind(request.payload)
    .bind(auth.api_key_id)
    .fetch_one(executor)
    .await?;

    tracing::info!(
        "approval request {} ({}) routed to {}",
        created.id,
        created.request_type,
        created.required_role
    );

    Ok(created)
}

/// Manual submission from the back office.
///
/// Large transfers must come through the transfer endpoint so the stored
/// payload is a validated transfer.
pub async fn submit_request(
    pool: &DbPool,
    auth: &AuthContext,
    request: SubmitRequest,
) -> Result<ApprovalRequest, AppError> {
    match request.request_type {
        RequestType::LargeTransfer => {
            return Err(AppError::invalid(
                "Large transfers are submitted through the transfer endpoint",
            ));
        }
        RequestType::LimitOverride => {
            if request.amount_cents.is_none_or(|amount| amount <= 0) {
                return Err(AppError::invalid("Limit overrides need a positive amount"));
            }
        }
        RequestType::CreditReferral => {
            if request.entity_id.is_none() {
                return Err(AppError::invalid("Credit referrals need the assessment id"));
            }
        }
        RequestType::AccountClosure => {
            let account_id = request
                .entity_id
                .ok_or_else(|| AppError::invalid("Account closures need the account id"))?;
            account_service::fetch_account(pool, auth.tenant_id, account_id).await?;
        }
    }

    let mut tx = pool.begin().await?;

    let created = create(
        &mut *tx,
        auth,
        NewApprovalRequest {
            request_type: request.request_type,
            entity_id: request.entity_id,
            amount_cents: request.amount_cents,
            payload: request.payload,
        },
    )
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "workflow.submitted",
        "approval_request",
        Some(created.id),
        Some(serde_json::json!({ "request_type": created.request_type })),
    )
    .await?;

    tx.commit().await?;

    Ok(created)
}

/// List requests of the caller's tenant, newest first.
pub async fn list_requests(
    pool: &DbPool,
    auth: &AuthContext,
    query: &WorkflowListQuery,
) -> Result<Vec<ApprovalRequest>, AppError> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT * FROM approval_requests WHERE tenant_id = ");
    builder.push_bind(auth.tenant_id);

    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
    if let Some(role) = query.required_role {
        builder.push(" AND required_role = ").push_bind(role.as_ref().to_string());
    }
    builder.push(" ORDER BY created_at DESC LIMIT 500");

    let requests = builder
        .build_query_as::<ApprovalRequest>()
        .fetch_all(pool)
        .await?;

    Ok(requests)
}

pub async fn get_request(
    pool: &DbPool,
    auth: &AuthContext,
    request_id: Uuid,
) -> Result<ApprovalRequest, AppError> {
    sqlx::query_as::<_, ApprovalRequest>(
        "SELECT * FROM approval_requests WHERE id = $1 AND tenant_id = $2",
    )
    .bind(request_id)
    .bind(auth.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Approval request"))
}

/// Approve a pending request and carry out its action.
pub async fn approve(
    pool: &DbPool,
    auth: &AuthContext,
    request_id: Uuid,
    note: Option<String>,
) -> Result<ApprovalRequest, AppError> {
    decide(pool, auth, request_id, ApprovalStatus::Approved, note).await
}

pub async fn reject(
    pool: &DbPool,
    auth: &AuthContext,
    request_id: Uuid,
    note: Option<String>,
) -> Result<ApprovalRequest, AppError> {
    decide(pool, auth, request_id, ApprovalStatus::Rejected, note).await
}

/// The caller must hold the routed role (or be admin) and must not be the requester.
pub fn check_decider(request: &ApprovalRequest, auth: &AuthContext) -> Result<(), AppError> {
    let required = Role::from_str(&request.required_role).map_err(|_| {
        AppError::InvalidState(format!("Unknown approver role {}", request.required_role))
    })?;

    auth.require_any(&[required])?;

    if request.requested_by == auth.api_key_id {
        return Err(AppError::Forbidden);
    }

    Ok(())
}

async fn decide(
    pool: &DbPool,
    auth: &AuthContext,
    request_id: Uuid,
    decision: ApprovalStatus,
    note: Option<String>,
) -> Result<ApprovalRequest, AppError> {
    let mut tx = pool.begin().await?;

    let request = sqlx::query_as::<_, ApprovalRequest>(
        "SELECT * FROM approval_requests WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(request_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Approval request"))?;

    if request.status != ApprovalStatus::Pending.as_ref() {
        return Err(AppError::InvalidState(format!(
            "Request is already {}",
            request.status
        )));
    }

    check_decider(&request, auth)?;

    let mut details = serde_json::json!({ "request_type": request.request_type });

    if decision == ApprovalStatus::Approved {
        let request_type = RequestType::from_str(&request.request_type).map_err(|_| {
            AppError::InvalidState(format!("Unknown request type {}", request.request_type))
        })?;

        match request_type {
            RequestType::LargeTransfer => {
                let payload = request
                    .payload
                    .clone()
                    .ok_or_else(|| AppError::InvalidState("Transfer payload missing".to_string()))?;
                let transfer: TransferRequest = serde_json::from_value(payload).map_err(|e| {
                    AppError::InvalidState(format!("Stored transfer is unreadable: {e}"))
                })?;

                let transaction =
                    transaction_service::apply_transfer(&mut tx, auth.tenant_id, &transfer).await?;
                details["transaction_id"] = serde_json::json!(transaction.id);
            }
            RequestType::AccountClosure => {
                let account_id = request
                    .entity_id
                    .ok_or_else(|| AppError::InvalidState("Account id missing".to_string()))?;
                account_service::close_in_tx(&mut tx, auth, account_id).await?;
            }
            // Decision only; the requesting team acts on it
            RequestType::CreditReferral | RequestType::LimitOverride => {}
        }
    }

    let decided = sqlx::query_as::<_, ApprovalRequest>(
        r#"
        UPDATE approval_requests
        SET status = $1, decided_by = $2, decision_note = $3, decided_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.api_key_id)
    .bind(note)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        &format!("workflow.{decision}"),
        "approval_request",
        Some(request_id),
        Some(details),
    )
    .await?;

    tx.commit().await?;

    tracing::info!("approval request {} {}", request_id, decision);

    Ok(decided)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::test_context;
    use chrono::Utc;

    #[test]
    fn monetary_requests_route_by_amount() {
        assert_eq!(route(RequestType::LargeTransfer, Some(999_999)), Role::Supervisor);
        assert_eq!(route(RequestType::LargeTransfer, Some(1_000_000)), Role::BranchManager);
        assert_eq!(route(RequestType::LimitOverride, Some(9_999_999)), Role::BranchManager);
        assert_eq!(route(RequestType::LargeTransfer, Some(10_000_000)), Role::RiskCommittee);
    }

    #[test]
    fn credit_referrals_route_to_credit_or_risk() {
        assert_eq!(route(RequestType::CreditReferral, Some(4_999_999)), Role::CreditOfficer);
        assert_eq!(route(RequestType::CreditReferral, Some(5_000_000)), Role::RiskCommittee);
        assert_eq!(route(RequestType::CreditReferral, None), Role::CreditOfficer);
    }

    #[test]
    fn closures_go_to_branch_manager() {
        assert_eq!(route(RequestType::AccountClosure, None), Role::BranchManager);
    }

    fn pending(required_role: Role, requested_by: Uuid) -> ApprovalRequest {
        ApprovalRequest {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            request_type: "large_transfer".to_string(),
            entity_id: None,
            amount_cents: Some(2_000_000),
            required_role: required_role.as_ref().to_string(),
            status: "pending".to_string(),
            payload: None,
            requested_by,
            decided_by: None,
            decision_note: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    #[test]
    fn decider_needs_routed_role() {
        let manager = test_context(Role::BranchManager);
        let supervisor = test_context(Role::Supervisor);
        let request = pending(Role::BranchManager, Uuid::new_v4());

        assert!(check_decider(&request, &manager).is_ok());
        assert!(matches!(
            check_decider(&request, &supervisor),
            Err(AppError::Forbidden)
        ));
        assert!(check_decider(&request, &test_context(Role::Admin)).is_ok());
    }

    #[test]
    fn requester_cannot_decide_own_request() {
        let admin = test_context(Role::Admin);
        let request = pending(Role::Supervisor, admin.api_key_id);
        assert!(matches!(
            check_decider(&request, &admin),
            Err(AppError::Forbidden)
        ));
    }
}
