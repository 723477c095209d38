//! Wallet reconciliation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::money;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReconciliationRun {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub accounts_checked: i32,
    pub mismatches: i32,
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Stored balance next to the balance implied by the ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerPosition {
    pub account_id: Uuid,
    pub account_number: String,
    pub currency: String,
    pub balance_cents: i64,
    pub ledger_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub account_id: Uuid,
    pub account_number: String,
    pub currency: String,
    pub stored_balance: String,
    pub ledger_balance: String,
    /// stored - ledger
    pub difference: String,
    pub difference_cents: i64,
}

impl Mismatch {
    pub fn from_position(position: &LedgerPosition) -> Option<Self> {
        let difference_cents = position.balance_cents - position.ledger_cents;
        if difference_cents == 0 {
            return None;
        }
        Some(Self {
            account_id: position.account_id,
            account_number: position.account_number.clone(),
            currency: position.currency.clone(),
            stored_balance: money::cents_to_string(position.balance_cents),
            ledger_balance: money::cents_to_string(position.ledger_cents),
            difference: money::cents_to_string(difference_cents),
            difference_cents,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub id: Uuid,
    pub accounts_checked: i32,
    pub mismatches: i32,
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<ReconciliationRun> for ReconciliationResponse {
    fn from(run: ReconciliationRun) -> Self {
        Self {
            id: run.id,
            accounts_checked: run.accounts_checked,
            mismatches: run.mismatches,
            report: run.report,
            created_at: run.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(balance_cents: i64, ledger_cents: i64) -> LedgerPosition {
        LedgerPosition {
            account_id: Uuid::new_v4(),
            account_number: "1234567897".to_string(),
            currency: "USD".to_string(),
            balance_cents,
            ledger_cents,
        }
    }

    #[test]
    fn balanced_account_is_not_a_mismatch() {
        assert!(Mismatch::from_position(&position(5000, 5000)).is_none());
    }

    #[test]
    fn difference_is_stored_minus_ledger() {
        let m = Mismatch::from_position(&position(5000, 5250)).unwrap();
        assert_eq!(m.difference_cents, -250);
        assert_eq!(m.difference, "-2.50");
        assert_eq!(m.stored_balance, "50.00");
        assert_eq!(m.ledger_balance, "52.50");
    }
}
