//! Account management HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /api/v1/accounts - Open a new account
//! - GET /api/v1/accounts - List accounts (optionally by customer or status)
//! - GET /api/v1/accounts/{id} - Get account by ID
//! - POST /api/v1/accounts/{id}/freeze | unfreeze | close - Status changes
//! - GET /api/v1/accounts/{id}/transactions - Transaction history
//! - GET /api/v1/accounts/{id}/transactions/export - Same history as CSV

use axum::{
    Extension,
    extract::State,
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    handlers::{ApiResult, extract::{Json, Path, Query}, respond, respond_list},
    middleware::auth::AuthContext,
    models::{
        account::{AccountListQuery, AccountResponse, HistoryQuery, OpenAccountRequest},
        transaction::TransactionResponse,
    },
    services::account_service,
};

/// Open a new account.
///
/// # Endpoint
///
/// `POST /api/v1/accounts`
///
/// # Request Body
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "account_type": "checking",
///   "account_name": "My Account",
///   "currency": "USD",
///   "initial_deposit_cents": 10000
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: the account inside the envelope, with a freshly
///   generated Luhn-checked account number
/// - **Error (400)**: invalid type, currency or negative deposit
/// - **Error (404)**: customer or branch not found
/// - **Error (409)**: customer failed KYC or the branch is closed
pub async fn open_account(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<OpenAccountRequest>,
) -> ApiResult<AccountResponse> {
    let account = account_service::open_account(&pool, &auth, request).await?;
    respond(account.into(), "Account opened")
}

/// Get a specific account by ID.
///
/// Returns 404 if the account doesn't exist OR belongs to a different bank,
/// so other tenants' account ids cannot be probed.
pub async fn get_account(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<AccountResponse> {
    let account = account_service::get_account(&pool, &auth, account_id).await?;
    respond(account.into(), "Account retrieved")
}

/// List accounts, newest first.
///
/// # Query Parameters
///
/// - `customer_id` - only this customer's accounts
/// - `status` - `active`, `frozen` or `closed`
pub async fn list_accounts(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AccountListQuery>,
) -> ApiResult<Vec<AccountResponse>> {
    let accounts = account_service::list_accounts(&pool, &auth, &query).await?;
    respond_list(accounts, "Accounts retrieved")
}

pub async fn freeze_account(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<AccountResponse> {
    let account = account_service::freeze_account(&pool, &auth, account_id).await?;
    respond(account.into(), "Account frozen")
}

pub async fn unfreeze_account(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<AccountResponse> {
    let account = account_service::unfreeze_account(&pool, &auth, account_id).await?;
    respond(account.into(), "Account unfrozen")
}

/// Close an account. The balance must be zero.
pub async fn close_account(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<AccountResponse> {
    let account = account_service::close_account(&pool, &auth, account_id).await?;
    respond(account.into(), "Account closed")
}

/// Transactions touching the account, newest first.
///
/// # Query Parameters
///
/// - `limit` - default 100, at most 1000
/// - `offset` - default 0
pub async fn list_account_transactions(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<TransactionResponse>> {
    let transactions = account_service::list_account_transactions(
        &pool,
        &auth,
        account_id,
        query.limit,
        query.offset,
    )
    .await?;
    respond_list(transactions, "Transactions retrieved")
}

/// CSV download of the same rows as the history endpoint. Amounts are
/// signed from the account's point of view.
pub async fn export_account_transactions(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let csv = account_service::export_account_transactions(
        &pool,
        &auth,
        account_id,
        query.limit,
        query.offset,
    )
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"transactions-{account_id}.csv\""),
            ),
        ],
        csv,
    ))
}
