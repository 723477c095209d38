//! Account statements.
//!
//! The rendered PDF is only ever stored encrypted; the `statements` row keeps
//! the figures needed to list statements without decrypting them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::money;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Statement {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance_cents: i64,
    pub closing_balance_cents: i64,
    pub total_credits_cents: i64,
    pub total_debits_cents: i64,
    pub transaction_count: i32,
    /// Hex SHA-256 of the plaintext PDF
    pub checksum: String,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateStatementRequest {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct StatementResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: String,
    pub closing_balance: String,
    pub total_credits: String,
    pub total_debits: String,
    pub transaction_count: i32,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

/// Drops the encrypted document; metadata only.
impl From<Statement> for StatementResponse {
    fn from(s: Statement) -> Self {
        Self {
            id: s.id,
            account_id: s.account_id,
            period_start: s.period_start,
            period_end: s.period_end,
            opening_balance: money::cents_to_string(s.opening_balance_cents),
            closing_balance: money::cents_to_string(s.closing_balance_cents),
            total_credits: money::cents_to_string(s.total_credits_cents),
            total_debits: money::cents_to_string(s.total_debits_cents),
            transaction_count: s.transaction_count,
            checksum: s.checksum,
            created_at: s.created_at,
        }
    }
}
