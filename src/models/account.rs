//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity representing an account
//! - `OpenAccountRequest`: Request body for opening accounts
//! - `AccountResponse`: Response body returned to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::models::money;

/// Represents an account record from the database.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents to avoid floating-point precision issues.
///
/// For example:
/// - $10.50 is stored as 1050 cents
/// - $100.00 is stored as 10000 cents
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,

    /// Tenant (bank) that owns this account. Every query filters by it.
    pub tenant_id: Uuid,

    pub customer_id: Uuid,

    pub branch_id: Option<Uuid>,

    /// Ten digits, the last one a Luhn check digit
    pub account_number: String,

    pub account_type: String,

    pub account_name: String,

    /// Current balance in cents. Never negative (database CHECK constraint).
    pub balance_cents: i64,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    pub status: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

impl AccountStatus {
    /// `active <-> frozen`, and either may close. `closed` is terminal.
    pub fn can_transition_to(self, next: AccountStatus) -> bool {
        matches!(
            (self, next),
            (AccountStatus::Active, AccountStatus::Frozen)
                | (AccountStatus::Frozen, AccountStatus::Active)
                | (AccountStatus::Active, AccountStatus::Closed)
                | (AccountStatus::Frozen, AccountStatus::Closed)
        )
    }
}

/// Request body for opening a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "account_type": "savings",
///   "account_name": "Rainy day",
///   "currency": "USD",
///   "initial_deposit_cents": 10000
/// }
/// ```
///
/// # Validation
///
/// - `account_name`: Required, non-empty
/// - `currency`: Optional, defaults to "USD"
/// - `initial_deposit_cents`: Optional, defaults to 0, never negative
#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub customer_id: Uuid,

    pub account_type: AccountType,

    pub account_name: String,

    /// Currency code (defaults to "USD" if not provided)
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub initial_deposit_cents: i64,

    pub branch_id: Option<Uuid>,
}

/// Default currency value when not specified in request.
fn default_currency() -> String {
    "USD".to_string()
}

/// Query string for `GET /api/v1/accounts`.
#[derive(Debug, Default, Deserialize)]
pub struct AccountListQuery {
    pub customer_id: Option<Uuid>,
    pub status: Option<AccountStatus>,
}

/// Paging for account transaction history.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response body for account endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "customer_id": "660e8400-e29b-41d4-a716-446655440001",
///   "account_number": "4820193755",
///   "account_type": "checking",
///   "account_name": "My Account",
///   "balance_cents": 100000,
///   "balance": "1000.00",
///   "currency": "USD",
///   "status": "active",
///   "created_at": "2025-12-20T10:00:00Z",
///   "updated_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub account_number: String,
    pub account_type: String,
    pub account_name: String,
    pub balance_cents: i64,
    pub balance: String,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Convert database Account to API AccountResponse.
///
/// Removes the internal `tenant_id` field and adds the decimal balance.
impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            customer_id: account.customer_id,
            branch_id: account.branch_id,
            account_number: account.account_number,
            account_type: account.account_type,
            account_name: account.account_name,
            balance: money::cents_to_string(account.balance_cents),
            balance_cents: account.balance_cents,
            currency: account.currency,
            status: account.status,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_terminal() {
        for next in [AccountStatus::Active, AccountStatus::Frozen, AccountStatus::Closed] {
            assert!(!AccountStatus::Closed.can_transition_to(next));
        }
    }

    #[test]
    fn freeze_and_unfreeze() {
        assert!(AccountStatus::Active.can_transition_to(AccountStatus::Frozen));
        assert!(AccountStatus::Frozen.can_transition_to(AccountStatus::Active));
        assert!(!AccountStatus::Active.can_transition_to(AccountStatus::Active));
    }

    #[test]
    fn open_request_defaults_currency_and_deposit() {
        let request: OpenAccountRequest = serde_json::from_value(serde_json::json!({
            "customer_id": "550e8400-e29b-41d4-a716-446655440000",
            "account_type": "checking",
            "account_name": "Main"
        }))
        .unwrap();
        assert_eq!(request.currency, "USD");
        assert_eq!(request.initial_deposit_cents, 0);
        assert_eq!(request.account_type, AccountType::Checking);
    }
}
