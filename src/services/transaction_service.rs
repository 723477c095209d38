//! Transaction service - Core business logic for money movement.
//!
//! This service handles:
//! - Atomic balance updates
//! - Idempotency checking
//! - Balance and account status validation
//! - Routing large transfers to approval
//!
//! # Atomicity Guarantees
//!
//! All balance updates happen within PostgreSQL transactions.
//! The database ensures all-or-nothing execution.

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        alert::{AlertType, NewAlert, Severity},
        money,
        transaction::{
            CreditRequest, DebitRequest, Transaction, TransactionResponse, TransferOutcome,
            TransferRequest,
        },
        workflow::{NewApprovalRequest, RequestType},
    },
    services::{alert_service, audit_service, workflow_service},
};

/// Account columns needed while moving money.
#[derive(Debug, sqlx::FromRow)]
struct LockedAccount {
    id: Uuid,
    balance_cents: i64,
    currency: String,
    status: String,
}

impl LockedAccount {
    fn ensure_active(&self) -> Result<(), AppError> {
        if self.status == "active" {
            Ok(())
        } else {
            Err(AppError::InvalidState(format!(
                "Account {} is {}",
                self.id, self.status
            )))
        }
    }
}

/// Both sides active and in the same currency.
fn ensure_transferable(from: &LockedAccount, to: &LockedAccount) -> Result<(), AppError> {
    from.ensure_active()?;
    to.ensure_active()?;

    if from.currency != to.currency {
        return Err(AppError::invalid(format!(
            "Currency mismatch: {} to {}",
            from.currency, to.currency
        )));
    }

    Ok(())
}

/// Transfers at or above the threshold wait for an approver.
pub fn requires_approval(amount_cents: i64, threshold_cents: i64) -> bool {
    amount_cents >= threshold_cents
}

fn validate_amount(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::invalid("Amount must be positive"));
    }
    Ok(())
}

/// Lock an account row for the rest of the transaction.
async fn lock_account(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    account_id: Uuid,
) -> Result<LockedAccount, AppError> {
    sqlx::query_as::<_, LockedAccount>(
        r#"
        SELECT id, balance_cents, currency, status
        FROM accounts
        WHERE id = $1 AND tenant_id = $2
        FOR UPDATE
        "#,
    )
    .bind(account_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Account"))
}

async fn find_by_idempotency_key<'e, E>(
    executor: E,
    tenant_id: Uuid,
    key: &str,
) -> Result<Option<Transaction>, AppError>
where
    E: PgExecutor<'e>,
{
    let existing = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE tenant_id = $1 AND idempotency_key = $2",
    )
    .bind(tenant_id)
    .bind(key)
    .fetch_optional(executor)
    .await?;

    Ok(existing)
}

/// Execute a credit transaction (add money to account).
///
/// # Process
///
/// 1. Check for duplicate idempotency key
/// 2. Start database transaction
/// 3. Lock the account, check it is active, update balance
/// 4. Record transaction and audit entry
/// 5. Commit (or rollback on error)
///
/// # Errors
///
/// - `NotFound`: Account doesn't exist in the caller's tenant
/// - `InvalidRequest`: Amount is zero or negative
/// - `InvalidState`: Account is frozen or closed
pub async fn execute_credit(
    pool: &DbPool,
    auth: &AuthContext,
    request: CreditRequest,
) -> Result<Transaction, AppError> {
    validate_amount(request.amount_cents)?;

    if let Some(ref key) = request.idempotency_key {
        if let Some(existing) = find_by_idempotency_key(pool, auth.tenant_id, key).await? {
            return Ok(existing);
        }
    }

    let mut tx = pool.begin().await?;

    let account = lock_account(&mut tx, auth.tenant_id, request.account_id).await?;
    account.ensure_active()?;

    sqlx::query(
        "UPDATE accounts SET balance_cents = balance_cents + $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(request.amount_cents)
    .bind(account.id)
    .execute(&mut *tx)
    .await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            tenant_id,
            transaction_type,
            to_account_id,
            amount_cents,
            currency,
            description,
            idempotency_key,
            status
        )
        VALUES ($1, 'credit', $2, $3, $4, $5, $6, 'completed')
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(account.id)
    .bind(request.amount_cents)
    .bind(&account.currency)
    .bind(request.description)
    .bind(request.idempotency_key)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "transaction.credit",
        "transaction",
        Some(transaction.id),
        Some(serde_json::json!({ "account_id": account.id, "amount": money::cents_to_string(transaction.amount_cents) })),
    )
    .await?;

    tx.commit().await?;

    Ok(transaction)
}

/// Execute a debit transaction (remove money from account).
pub async fn execute_debit(
    pool: &DbPool,
    auth: &AuthContext,
    request: DebitRequest,
) -> Result<Transaction, AppError> {
    validate_amount(request.amount_cents)?;

    if let Some(ref key) = request.idempotency_key {
        if let Some(existing) = find_by_idempotency_key(pool, auth.tenant_id, key).await? {
            return Ok(existing);
        }
    }

    let mut tx = pool.begin().await?;

    let account = lock_account(&mut tx, auth.tenant_id, request.account_id).await?;
    account.ensure_active()?;

    if account.balance_cents < request.amount_cents {
        tx.rollback().await?;
        return Err(AppError::InsufficientBalance);
    }

    sqlx::query(
        "UPDATE accounts SET balance_cents = balance_cents - $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(request.amount_cents)
    .bind(account.id)
    .execute(&mut *tx)
    .await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            tenant_id,
            transaction_type,
            from_account_id,
            amount_cents,
            currency,
            description,
            idempotency_key,
            status
        )
        VALUES ($1, 'debit', $2, $3, $4, $5, $6, 'completed')
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(account.id)
    .bind(request.amount_cents)
    .bind(&account.currency)
    .bind(request.description)
    .bind(request.idempotency_key)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "transaction.debit",
        "transaction",
        Some(transaction.id),
        Some(serde_json::json!({ "account_id": account.id, "amount": money::cents_to_string(transaction.amount_cents) })),
    )
    .await?;

    tx.commit().await?;

    Ok(transaction)
}

fn validate_transfer(request: &TransferRequest) -> Result<(), AppError> {
    validate_amount(request.amount_cents)?;

    if request.from_account_id == request.to_account_id {
        return Err(AppError::invalid("Cannot transfer to same account"));
    }

    Ok(())
}

/// Transfer money between accounts, or park it for approval.
///
/// Amounts at or above `large_transfer_threshold_cents` are not executed:
/// an approval request holding the transfer is created and a
/// `large_transfer_pending` alert is raised.
pub async fn execute_transfer(
    pool: &DbPool,
    config: &Config,
    auth: &AuthContext,
    request: TransferRequest,
) -> Result<TransferOutcome, AppError> {
    validate_transfer(&request)?;

    if let Some(ref key) = request.idempotency_key {
        if let Some(existing) = find_by_idempotency_key(pool, auth.tenant_id, key).await? {
            return Ok(TransferOutcome::Completed {
                transaction: existing.into(),
            });
        }

        let pending: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM approval_requests
            WHERE tenant_id = $1
              AND request_type = 'large_transfer'
              AND status = 'pending'
              AND payload->>'idempotency_key' = $2
            "#,
        )
        .bind(auth.tenant_id)
        .bind(key)
        .fetch_optional(pool)
        .await?;

        if let Some(approval_request_id) = pending {
            return Ok(TransferOutcome::PendingApproval { approval_request_id });
        }
    }

    let mut tx = pool.begin().await?;

    if requires_approval(request.amount_cents, config.large_transfer_threshold_cents) {
        let approval_request_id = park_transfer(&mut tx, auth, &request).await?;
        tx.commit().await?;
        return Ok(TransferOutcome::PendingApproval { approval_request_id });
    }

    let transaction = apply_transfer(&mut tx, auth.tenant_id, &request).await?;

    audit_service::record(
        &mut *tx,
        auth,
        "transaction.transfer",
        "transaction",
        Some(transaction.id),
        Some(serde_json::json!({
            "from_account_id": request.from_account_id,
            "to_account_id": request.to_account_id,
            "amount": money::cents_to_string(request.amount_cents),
        })),
    )
    .await?;

    tx.commit().await?;

    Ok(TransferOutcome::Completed {
        transaction: TransactionResponse::from(transaction),
    })
}

async fn park_transfer(
    conn: &mut PgConnection,
    auth: &AuthContext,
    request: &TransferRequest,
) -> Result<Uuid, AppError> {
    // Fail early on bad accounts instead of at approval time
    let (from, to) = lock_transfer_accounts(conn, auth.tenant_id, request).await?;
    ensure_transferable(&from, &to)?;

    let payload = serde_json::to_value(request)
        .map_err(|e| AppError::invalid(format!("Unserializable transfer: {e}")))?;

    let approval = workflow_service::create(
        &mut *conn,
        auth,
        NewApprovalRequest {
            request_type: RequestType::LargeTransfer,
            entity_id: Some(request.from_account_id),
            amount_cents: Some(request.amount_cents),
            payload: Some(payload),
        },
    )
    .await?;

    alert_service::raise(
        &mut *conn,
        auth.tenant_id,
        NewAlert {
            alert_type: AlertType::LargeTransferPending,
            severity: Severity::Medium,
            entity_type: "approval_request",
            entity_id: Some(approval.id),
            message: format!(
                "Transfer of {} from account {} awaits {} approval",
                money::cents_to_string(request.amount_cents),
                request.from_account_id,
                approval.required_role
            ),
        },
    )
    .await?;

    audit_service::record(
        &mut *conn,
        auth,
        "transaction.transfer_parked",
        "approval_request",
        Some(approval.id),
        Some(serde_json::json!({ "amount": money::cents_to_string(request.amount_cents) })),
    )
    .await?;

    Ok(approval.id)
}

/// Lock both sides of a transfer in id order so two opposite transfers
/// cannot deadlock. Returns `(from, to)`.
async fn lock_transfer_accounts(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: &TransferRequest,
) -> Result<(LockedAccount, LockedAccount), AppError> {
    let (first, second) = if request.from_account_id < request.to_account_id {
        (request.from_account_id, request.to_account_id)
    } else {
        (request.to_account_id, request.from_account_id)
    };
    let first = lock_account(conn, tenant_id, first).await?;
    let second = lock_account(conn, tenant_id, second).await?;
    Ok(if first.id == request.from_account_id {
        (first, second)
    } else {
        (second, first)
    })
}

/// Move money inside a caller-owned transaction.
pub async fn apply_transfer(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    request: &TransferRequest,
) -> Result<Transaction, AppError> {
    validate_transfer(request)?;

    let (from, to) = lock_transfer_accounts(conn, tenant_id, request).await?;
    ensure_transferable(&from, &to)?;

    if from.balance_cents < request.amount_cents {
        return Err(AppError::InsufficientBalance);
    }

    sqlx::query(
        "UPDATE accounts SET balance_cents = balance_cents - $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(request.amount_cents)
    .bind(from.id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE accounts SET balance_cents = balance_cents + $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(request.amount_cents)
    .bind(to.id)
    .execute(&mut *conn)
    .await?;

    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            tenant_id,
            transaction_type,
            from_account_id,
            to_account_id,
            amount_cents,
            currency,
            description,
            idempotency_key,
            status
        )
        VALUES ($1, 'transfer', $2, $3, $4, $5, $6, $7, 'completed')
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(from.id)
    .bind(to.id)
    .bind(request.amount_cents)
    .bind(&from.currency)
    .bind(&request.description)
    .bind(&request.idempotency_key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(transaction)
}

/// Get transaction by ID within the caller's tenant.
pub async fn get_transaction(
    pool: &DbPool,
    auth: &AuthContext,
    transaction_id: Uuid,
) -> Result<Transaction, AppError> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 AND tenant_id = $2")
        .bind(transaction_id)
        .bind(auth.tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Transaction"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(from: Uuid, to: Uuid, amount_cents: i64) -> TransferRequest {
        TransferRequest {
            from_account_id: from,
            to_account_id: to,
            amount_cents,
            description: None,
            idempotency_key: Some("invoice-789".to_string()),
        }
    }

    #[test]
    fn transfer_validation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_transfer(&transfer(a, b, 100)).is_ok());
        assert!(validate_transfer(&transfer(a, b, 0)).is_err());
        assert!(validate_transfer(&transfer(a, a, 100)).is_err());
    }

    #[test]
    fn parked_transfer_payload_round_trips() {
        let request = transfer(Uuid::new_v4(), Uuid::new_v4(), 5_000_000);
        let payload = serde_json::to_value(&request).unwrap();
        assert_eq!(payload["idempotency_key"], "invoice-789");

        let restored: TransferRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(restored.amount_cents, 5_000_000);
        assert_eq!(restored.from_account_id, request.from_account_id);
    }

    #[test]
    fn frozen_accounts_cannot_move_money() {
        let account = LockedAccount {
            id: Uuid::new_v4(),
            balance_cents: 100,
            currency: "USD".to_string(),
            status: "frozen".to_string(),
        };
        assert!(matches!(account.ensure_active(), Err(AppError::InvalidState(_))));
    }

    #[test]
    fn approval_threshold_is_inclusive() {
        let threshold = 1_000_000;
        assert!(!requires_approval(threshold - 1, threshold));
        assert!(requires_approval(threshold, threshold));
        assert!(requires_approval(threshold + 1, threshold));
    }

    fn locked(currency: &str, status: &str) -> LockedAccount {
        LockedAccount {
            id: Uuid::new_v4(),
            balance_cents: 10_000_000,
            currency: currency.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn transfers_need_matching_currencies() {
        assert!(ensure_transferable(&locked("USD", "active"), &locked("USD", "active")).is_ok());
        assert!(matches!(
            ensure_transferable(&locked("USD", "active"), &locked("EUR", "active")),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(matches!(
            ensure_transferable(&locked("USD", "active"), &locked("USD", "closed")),
            Err(AppError::InvalidState(_))
        ));
    }
}
