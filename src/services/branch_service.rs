//! Branch registry and vault cash.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        api_key::Role,
        branch::{Branch, BranchStatus, BranchSummary, CashAdjustmentRequest, CreateBranchRequest},
        money,
    },
    services::{audit_service, customer_service::map_unique_violation},
};

/// 3 to 8 characters, upper-case letters and digits only.
pub fn validate_branch_code(code: &str) -> Result<(), AppError> {
    if (3..=8).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(AppError::invalid(
            "Branch code must be 3 to 8 upper-case letters or digits",
        ))
    }
}

/// New cash on hand after `delta_cents`. Never below zero.
pub fn apply_cash_delta(current_cents: i64, delta_cents: i64) -> Result<i64, AppError> {
    if delta_cents == 0 {
        return Err(AppError::invalid("Cash adjustment cannot be zero"));
    }

    match current_cents.checked_add(delta_cents) {
        Some(next) if next >= 0 => Ok(next),
        Some(_) => Err(AppError::invalid("Not enough cash on hand")),
        None => Err(AppError::invalid("Cash adjustment is out of range")),
    }
}

pub async fn create_branch(
    pool: &DbPool,
    auth: &AuthContext,
    request: CreateBranchRequest,
) -> Result<Branch, AppError> {
    auth.require_any(&[])?;

    validate_branch_code(&request.code)?;
    if request.name.trim().is_empty() || request.city.trim().is_empty() {
        return Err(AppError::invalid("Branch name and city are required"));
    }

    let mut tx = pool.begin().await?;

    let branch = sqlx::query_as::<_, Branch>(
        r#"
        INSERT INTO branches (tenant_id, code, name, city)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&request.code)
    .bind(request.name.trim())
    .bind(request.city.trim())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "Branch code is already in use"))?;

    audit_service::record(
        &mut *tx,
        auth,
        "branch.created",
        "branch",
        Some(branch.id),
        Some(serde_json::json!({ "code": branch.code })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!("branch {} ({}) created", branch.code, branch.id);

    Ok(branch)
}

/// Ordered by code.
pub async fn list_branches(pool: &DbPool, auth: &AuthContext) -> Result<Vec<Branch>, AppError> {
    let branches = sqlx::query_as::<_, Branch>(
        "SELECT * FROM branches WHERE tenant_id = $1 ORDER BY code",
    )
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(branches)
}

pub async fn get_branch(pool: &DbPool, auth: &AuthContext, branch_id: Uuid) -> Result<Branch, AppError> {
    sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE id = $1 AND tenant_id = $2")
        .bind(branch_id)
        .bind(auth.tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Branch"))
}

pub async fn set_branch_status(
    pool: &DbPool,
    auth: &AuthContext,
    branch_id: Uuid,
    status: BranchStatus,
) -> Result<Branch, AppError> {
    auth.require_any(&[])?;

    let mut tx = pool.begin().await?;

    let branch = sqlx::query_as::<_, Branch>(
        r#"
        UPDATE branches SET status = $1, updated_at = NOW()
        WHERE id = $2 AND tenant_id = $3
        RETURNING *
        "#,
    )
    .bind(status.as_ref())
    .bind(branch_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Branch"))?;

    audit_service::record(
        &mut *tx,
        auth,
        &format!("branch.{status}"),
        "branch",
        Some(branch_id),
        None,
    )
    .await?;

    tx.commit().await?;

    Ok(branch)
}

/// Move cash in or out of the branch vault.
///
/// # Access
///
/// Supervisors and branch managers.
pub async fn adjust_cash(
    pool: &DbPool,
    auth: &AuthContext,
    branch_id: Uuid,
    request: CashAdjustmentRequest,
) -> Result<Branch, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager])?;

    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(AppError::invalid("A reason is required for cash adjustments"));
    }

    let mut tx = pool.begin().await?;

    let branch = sqlx::query_as::<_, Branch>(
        "SELECT * FROM branches WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(branch_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Branch"))?;

    if branch.status != BranchStatus::Open.as_ref() {
        return Err(AppError::InvalidState("Branch is closed".to_string()));
    }

    let cash_on_hand = apply_cash_delta(branch.cash_on_hand_cents, request.delta_cents)?;

    let updated = sqlx::query_as::<_, Branch>(
        r#"
        UPDATE branches SET cash_on_hand_cents = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(cash_on_hand)
    .bind(branch_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "branch.cash_adjusted",
        "branch",
        Some(branch_id),
        Some(serde_json::json!({
            "delta_cents": request.delta_cents,
            "cash_on_hand_cents": cash_on_hand,
            "reason": reason,
        })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        "branch {} cash adjusted by {} ({})",
        updated.code,
        money::cents_to_string(request.delta_cents),
        reason
    );

    Ok(updated)
}

/// Customers, open accounts and deposits booked at a branch.
pub async fn branch_summary(
    pool: &DbPool,
    auth: &AuthContext,
    branch_id: Uuid,
) -> Result<BranchSummary, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager, Role::Auditor])?;

    let branch = get_branch(pool, auth, branch_id).await?;

    let customer_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM customers WHERE branch_id = $1 AND tenant_id = $2",
    )
    .bind(branch_id)
    .bind(auth.tenant_id)
    .fetch_one(pool)
    .await?;

    let (account_count, total_deposits_cents): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(balance_cents), 0)::BIGINT
        FROM accounts
        WHERE branch_id = $1 AND tenant_id = $2 AND status <> 'closed'
        "#,
    )
    .bind(branch_id)
    .bind(auth.tenant_id)
    .fetch_one(pool)
    .await?;

    Ok(BranchSummary {
        branch: branch.into(),
        customer_count,
        account_count,
        total_deposits: money::cents_to_string(total_deposits_cents),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::test_context;

    #[test]
    fn branch_codes() {
        assert!(validate_branch_code("LDN01").is_ok());
        assert!(validate_branch_code("NYC").is_ok());
        assert!(validate_branch_code("ABCDEFGH").is_ok());
        assert!(validate_branch_code("AB").is_err());
        assert!(validate_branch_code("ABCDEFGHI").is_err());
        assert!(validate_branch_code("ldn01").is_err());
        assert!(validate_branch_code("LDN-1").is_err());
    }

    #[test]
    fn cash_never_goes_negative() {
        assert_eq!(apply_cash_delta(10_000, -10_000).unwrap(), 0);
        assert_eq!(apply_cash_delta(0, 2_500).unwrap(), 2_500);
        assert!(apply_cash_delta(10_000, -10_001).is_err());
        assert!(apply_cash_delta(10_000, 0).is_err());
        assert!(apply_cash_delta(i64::MAX, 1).is_err());
    }

    #[tokio::test]
    async fn only_admins_create_branches() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let request = CreateBranchRequest {
            code: "LDN01".to_string(),
            name: "London".to_string(),
            city: "London".to_string(),
        };
        let result = create_branch(&pool, &test_context(Role::BranchManager), request).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }
}
