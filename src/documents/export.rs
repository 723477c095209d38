//! CSV export of account transactions.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{money, transaction::Transaction},
};

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: Uuid,
    created_at: String,
    transaction_type: &'a str,
    /// Signed from the account's point of view
    amount: String,
    currency: &'a str,
    description: &'a str,
    status: &'a str,
}

/// One row per transaction, amounts signed for `account_id`.
pub fn transactions_csv(account_id: Uuid, transactions: &[Transaction]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for t in transactions {
        writer
            .serialize(CsvRow {
                id: t.id,
                created_at: t.created_at.to_rfc3339(),
                transaction_type: &t.transaction_type,
                amount: money::cents_to_string(t.signed_amount_for(account_id)),
                currency: &t.currency,
                description: t.description.as_deref().unwrap_or(""),
                status: &t.status,
            })
            .map_err(|e| AppError::Document(format!("csv row: {e}")))?;
    }

    if transactions.is_empty() {
        writer
            .write_record([
                "id",
                "created_at",
                "transaction_type",
                "amount",
                "currency",
                "description",
                "status",
            ])
            .map_err(|e| AppError::Document(format!("csv header: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Document(format!("csv flush: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn rows_are_signed_and_quoted() {
        let account = Uuid::new_v4();
        let t = Transaction {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            idempotency_key: None,
            transaction_type: "debit".to_string(),
            from_account_id: Some(account),
            to_account_id: None,
            amount_cents: 1_999,
            currency: "USD".to_string(),
            description: Some("Groceries, weekly".to_string()),
            status: "completed".to_string(),
            created_at: Utc::now(),
            metadata: None,
        };

        let csv = String::from_utf8(transactions_csv(account, &[t]).unwrap()).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("id,created_at,transaction_type,amount,currency,description,status")
        );
        let row = lines.next().unwrap();
        assert!(row.contains(",debit,-19.99,USD,\"Groceries, weekly\",completed"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_export_still_has_a_header() {
        let csv = String::from_utf8(transactions_csv(Uuid::new_v4(), &[]).unwrap()).unwrap();
        assert_eq!(
            csv,
            "id,created_at,transaction_type,amount,currency,description,status\n"
        );
    }
}
