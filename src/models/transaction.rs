//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: Database entity representing a transaction
//! - Request types for credit, debit, and transfer operations
//! - `TransactionResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::models::money;

/// Represents a transaction record from the database.
///
/// Each transaction references one or two accounts depending on its type
/// and stores its amount in cents.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// If a client sends the same idempotency_key twice, the second request
    /// returns the original transaction instead of creating a duplicate.
    pub idempotency_key: Option<String>,

    pub transaction_type: String,

    /// Source account (for debit and transfer)
    pub from_account_id: Option<Uuid>,

    /// Destination account (for credit and transfer)
    pub to_account_id: Option<Uuid>,

    /// Always positive (CHECK constraint)
    pub amount_cents: i64,

    pub currency: String,

    pub description: Option<String>,

    pub status: String,

    pub created_at: DateTime<Utc>,

    pub metadata: Option<serde_json::Value>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
    Transfer,
}

impl Transaction {
    /// Signed effect of this transaction on `account_id`, in cents.
    pub fn signed_amount_for(&self, account_id: Uuid) -> i64 {
        let mut delta = 0;
        if self.to_account_id == Some(account_id) {
            delta += self.amount_cents;
        }
        if self.from_account_id == Some(account_id) {
            delta -= self.amount_cents;
        }
        delta
    }
}

/// Request to credit (add money to) an account.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "amount_cents": 100000,
///   "description": "Initial deposit",
///   "idempotency_key": "deposit-2025-001"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Request to debit (remove money from) an account.
///
/// # Validation
///
/// - Account must have sufficient balance
/// - Amount must be positive
/// - Account must be active
#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Request to transfer money between accounts.
///
/// # JSON Example
///
/// ```json
/// {
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 25000,
///   "description": "Payment for services",
///   "idempotency_key": "invoice-789"
/// }
/// ```
///
/// # Atomicity Guarantee
///
/// BOTH accounts are updated in the same database transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Response returned for transaction operations.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "transaction_type": "transfer",
///   "from_account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 25000,
///   "amount": "250.00",
///   "currency": "USD",
///   "description": "Payment for services",
///   "status": "completed",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub transaction_type: String,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub amount_cents: i64,
    pub amount: String,
    pub currency: String,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Convert database Transaction to API TransactionResponse.
///
/// This removes internal fields like metadata and idempotency_key.
impl From<Transaction> for TransactionResponse {
    fn from(transaction: Transaction) -> Self {
        Self {
            id: transaction.id,
            transaction_type: transaction.transaction_type,
            from_account_id: transaction.from_account_id,
            to_account_id: transaction.to_account_id,
            amount: money::cents_to_string(transaction.amount_cents),
            amount_cents: transaction.amount_cents,
            currency: transaction.currency,
            description: transaction.description,
            status: transaction.status,
            created_at: transaction.created_at,
        }
    }
}

/// A transfer either runs right away or waits for an approver.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferOutcome {
    Completed { transaction: TransactionResponse },
    PendingApproval { approval_request_id: Uuid },
}
