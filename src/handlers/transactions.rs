//! Transaction HTTP handlers.
//!
//! This module implements transaction-related API endpoints:
//! - POST /api/v1/transactions/credit - Add money to account
//! - POST /api/v1/transactions/debit - Remove money from account
//! - POST /api/v1/transactions/transfer - Move money between accounts
//! - GET /api/v1/transactions/{id} - Get transaction details

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Json, Path}, respond},
    middleware::auth::AuthContext,
    models::transaction::{
        CreditRequest, DebitRequest, TransactionResponse, TransferOutcome, TransferRequest,
    },
    services::transaction_service,
    state::AppState,
};

/// Credit an account (add money).
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": "550e8400-...",
///   "amount_cents": 100000,
///   "description": "Initial deposit",
///   "idempotency_key": "deposit-001"
/// }
/// ```
///
/// Replaying an `idempotency_key` returns the original transaction.
pub async fn create_credit(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreditRequest>,
) -> ApiResult<TransactionResponse> {
    let transaction = transaction_service::execute_credit(&pool, &auth, request).await?;
    respond(transaction.into(), "Credit completed")
}

/// Debit an account (remove money).
///
/// # Endpoint
///
/// `POST /api/v1/transactions/debit`
///
/// # Validation
///
/// - Amount must be positive
/// - Account must be active with a sufficient balance (422 otherwise)
pub async fn create_debit(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<DebitRequest>,
) -> ApiResult<TransactionResponse> {
    let transaction = transaction_service::execute_debit(&pool, &auth, request).await?;
    respond(transaction.into(), "Debit completed")
}

/// Transfer money between accounts.
///
/// # Endpoint
///
/// `POST /api/v1/transactions/transfer`
///
/// # Large transfers
///
/// At or above the configured threshold nothing moves yet. The response
/// data is `{"status": "pending_approval", "approval_request_id": "..."}`
/// and the transfer runs when the request is approved.
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<TransferOutcome> {
    let outcome =
        transaction_service::execute_transfer(&state.pool, &state.config, &auth, request).await?;

    let message = match outcome {
        TransferOutcome::Completed { .. } => "Transfer completed",
        TransferOutcome::PendingApproval { .. } => "Transfer awaiting approval",
    };
    respond(outcome, message)
}

pub async fn get_transaction(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<TransactionResponse> {
    let transaction = transaction_service::get_transaction(&pool, &auth, transaction_id).await?;
    respond(transaction.into(), "Transaction retrieved")
}
