//! Account lifecycle: opening, lookup, status changes and history.

use std::str::FromStr;

use rand::Rng;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    documents::export,
    error::AppError,
    luhn,
    middleware::auth::AuthContext,
    models::{
        account::{Account, AccountListQuery, AccountStatus, OpenAccountRequest},
        api_key::Role,
        customer::KycStatus,
        money,
        transaction::Transaction,
    },
    services::{Page, audit_service, customer_service},
};

const ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

/// Nine random digits followed by a Luhn check digit. The first digit is never 0.
pub fn generate_account_number() -> String {
    let mut rng = rand::rng();
    let mut payload = String::with_capacity(10);
    payload.push(char::from(b'1' + rng.random_range(0..9u8)));
    for _ in 0..8 {
        payload.push(char::from(b'0' + rng.random_range(0..10u8)));
    }
    // payload is all digits, so a check digit always exists
    let check = luhn::check_digit(&payload).unwrap_or('0');
    payload.push(check);
    payload
}

fn validate_open_request(request: &OpenAccountRequest) -> Result<(), AppError> {
    if request.account_name.trim().is_empty() {
        return Err(AppError::invalid("Account name is required"));
    }
    if !money::is_valid_currency(&request.currency) {
        return Err(AppError::invalid("Currency must be a three-letter ISO code"));
    }
    if request.initial_deposit_cents < 0 {
        return Err(AppError::invalid("Initial deposit cannot be negative"));
    }
    Ok(())
}

/// Open an account for an existing customer.
///
/// # Process
///
/// 1. Validate the request and the customer's KYC state
/// 2. Generate an unused account number
/// 3. Insert the account and, for a non-zero deposit, the opening credit
/// 4. Audit and commit
pub async fn open_account(
    pool: &DbPool,
    auth: &AuthContext,
    request: OpenAccountRequest,
) -> Result<Account, AppError> {
    validate_open_request(&request)?;

    let mut tx = pool.begin().await?;

    let customer = customer_service::fetch_customer(&mut *tx, auth.tenant_id, request.customer_id).await?;
    if customer.kyc_status == KycStatus::Rejected.as_ref() {
        return Err(AppError::InvalidState(
            "Customer failed KYC review; accounts cannot be opened".to_string(),
        ));
    }

    let branch_id = request.branch_id.or(customer.branch_id);
    if let Some(branch_id) = branch_id {
        let open: Option<String> =
            sqlx::query_scalar("SELECT status FROM branches WHERE id = $1 AND tenant_id = $2")
                .bind(branch_id)
                .bind(auth.tenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        match open.as_deref() {
            None => return Err(AppError::NotFound("Branch")),
            Some("open") => {}
            Some(_) => return Err(AppError::InvalidState("Branch is closed".to_string())),
        }
    }

    let account_number = unused_account_number(&mut tx).await?;

    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (
            tenant_id, customer_id, branch_id, account_number, account_type,
            account_name, balance_cents, currency
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(customer.id)
    .bind(branch_id)
    .bind(&account_number)
    .bind(request.account_type.as_ref())
    .bind(request.account_name.trim())
    .bind(request.initial_deposit_cents)
    .bind(&request.currency)
    .fetch_one(&mut *tx)
    .await?;

    // The opening deposit goes through the ledger so reconciliation balances
    if request.initial_deposit_cents > 0 {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                tenant_id, transaction_type, to_account_id, amount_cents, currency, description, status
            )
            VALUES ($1, 'credit', $2, $3, $4, 'Opening deposit', 'completed')
            "#,
        )
        .bind(auth.tenant_id)
        .bind(account.id)
        .bind(request.initial_deposit_cents)
        .bind(&account.currency)
        .execute(&mut *tx)
        .await?;
    }

    audit_service::record(
        &mut *tx,
        auth,
        "account.opened",
        "account",
        Some(account.id),
        Some(serde_json::json!({
            "account_number": account.account_number,
            "initial_deposit": money::cents_to_string(request.initial_deposit_cents),
        })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!("account {} opened for customer {}", account.id, customer.id);

    Ok(account)
}

async fn unused_account_number(conn: &mut PgConnection) -> Result<String, AppError> {
    for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
        let candidate = generate_account_number();
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE account_number = $1)")
                .bind(&candidate)
                .fetch_one(&mut *conn)
                .await?;
        if !taken {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict(
        "Could not allocate an account number, retry".to_string(),
    ))
}

pub async fn get_account(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
) -> Result<Account, AppError> {
    fetch_account(pool, auth.tenant_id, account_id).await
}

/// Tenant-scoped lookup shared with other services.
pub async fn fetch_account<'e, E>(
    executor: E,
    tenant_id: Uuid,
    account_id: Uuid,
) -> Result<Account, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2")
        .bind(account_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Account"))
}

/// List accounts, newest first.
pub async fn list_accounts(
    pool: &DbPool,
    auth: &AuthContext,
    query: &AccountListQuery,
) -> Result<Vec<Account>, AppError> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM accounts WHERE tenant_id = ");
    builder.push_bind(auth.tenant_id);

    if let Some(customer_id) = query.customer_id {
        builder.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
    builder.push(" ORDER BY created_at DESC");

    let accounts = builder.build_query_as::<Account>().fetch_all(pool).await?;
    Ok(accounts)
}

pub async fn freeze_account(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
) -> Result<Account, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager])?;
    change_status(pool, auth, account_id, AccountStatus::Frozen).await
}

pub async fn unfreeze_account(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
) -> Result<Account, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager])?;
    change_status(pool, auth, account_id, AccountStatus::Active).await
}

/// Close directly. Operators go through an `account_closure` approval instead.
pub async fn close_account(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
) -> Result<Account, AppError> {
    auth.require_any(&[Role::BranchManager])?;

    let mut tx = pool.begin().await?;
    let account = close_in_tx(&mut tx, auth, account_id).await?;
    tx.commit().await?;

    Ok(account)
}

/// Close inside a caller-owned transaction. Requires a zero balance.
pub async fn close_in_tx(
    conn: &mut PgConnection,
    auth: &AuthContext,
    account_id: Uuid,
) -> Result<Account, AppError> {
    let account = lock_for_status_change(conn, auth.tenant_id, account_id, AccountStatus::Closed).await?;

    if account.balance_cents != 0 {
        return Err(AppError::InvalidState(format!(
            "Account still holds {} {}",
            money::cents_to_string(account.balance_cents),
            account.currency
        )));
    }

    apply_status(conn, auth, account, AccountStatus::Closed).await
}

async fn change_status(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
    next: AccountStatus,
) -> Result<Account, AppError> {
    let mut tx = pool.begin().await?;
    let account = lock_for_status_change(&mut tx, auth.tenant_id, account_id, next).await?;
    let account = apply_status(&mut tx, auth, account, next).await?;
    tx.commit().await?;

    Ok(account)
}

async fn lock_for_status_change(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    account_id: Uuid,
    next: AccountStatus,
) -> Result<Account, AppError> {
    let account = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(account_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Account"))?;

    let current = AccountStatus::from_str(&account.status)
        .map_err(|_| AppError::InvalidState(format!("Unknown account status {}", account.status)))?;

    if !current.can_transition_to(next) {
        return Err(AppError::InvalidState(format!(
            "Account cannot move from {current} to {next}"
        )));
    }

    Ok(account)
}

async fn apply_status(
    conn: &mut PgConnection,
    auth: &AuthContext,
    account: Account,
    next: AccountStatus,
) -> Result<Account, AppError> {
    let updated = sqlx::query_as::<_, Account>(
        "UPDATE accounts SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(next.as_ref())
    .bind(account.id)
    .fetch_one(&mut *conn)
    .await?;

    audit_service::record(
        &mut *conn,
        auth,
        &format!("account.{next}"),
        "account",
        Some(account.id),
        Some(serde_json::json!({ "from": account.status })),
    )
    .await?;

    tracing::info!("account {} is now {}", account.id, next);

    Ok(updated)
}

/// Transactions touching the account, newest first.
pub async fn list_account_transactions(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Transaction>, AppError> {
    fetch_account(pool, auth.tenant_id, account_id).await?;

    let page = Page::new(limit, offset, 100, 1000);

    let transactions = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE tenant_id = $1 AND (from_account_id = $2 OR to_account_id = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(auth.tenant_id)
    .bind(account_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

/// Same rows as [`list_account_transactions`], rendered as CSV.
pub async fn export_account_transactions(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<u8>, AppError> {
    let transactions = list_account_transactions(pool, auth, account_id, limit, offset).await?;
    export::transactions_csv(account_id, &transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::AccountType;

    #[test]
    fn generated_numbers_are_ten_luhn_valid_digits() {
        for _ in 0..200 {
            let number = generate_account_number();
            assert_eq!(number.len(), 10);
            assert!(!number.starts_with('0'));
            assert!(luhn::is_valid(&number), "{number}");
        }
    }

    fn request(currency: &str, deposit: i64, name: &str) -> OpenAccountRequest {
        OpenAccountRequest {
            customer_id: Uuid::new_v4(),
            account_type: AccountType::Savings,
            account_name: name.to_string(),
            currency: currency.to_string(),
            initial_deposit_cents: deposit,
            branch_id: None,
        }
    }

    #[test]
    fn open_request_validation() {
        assert!(validate_open_request(&request("USD", 0, "Main")).is_ok());
        assert!(validate_open_request(&request("usd", 0, "Main")).is_err());
        assert!(validate_open_request(&request("USD", -1, "Main")).is_err());
        assert!(validate_open_request(&request("USD", 100, "  ")).is_err());
    }
}
