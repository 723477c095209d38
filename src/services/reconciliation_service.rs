//! Wallet reconciliation: stored balances against the transaction ledger.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        alert::{AlertType, NewAlert, Severity},
        reconciliation::{LedgerPosition, Mismatch, ReconciliationRun},
    },
    services::{Page, alert_service, audit_service},
};

/// Mismatching positions and the JSON report stored with the run.
pub fn build_report(positions: &[LedgerPosition]) -> (Vec<Mismatch>, serde_json::Value) {
    let mismatches: Vec<Mismatch> = positions.iter().filter_map(Mismatch::from_position).collect();
    let net_difference_cents: i64 = mismatches.iter().map(|m| m.difference_cents).sum();

    let report = serde_json::json!({
        "accounts_checked": positions.len(),
        "net_difference_cents": net_difference_cents,
        "mismatches": mismatches,
    });

    (mismatches, report)
}

/// Compare every non-closed account with its ledger.
///
/// Each mismatch raises a critical alert. The run, its alerts and the audit
/// entry commit together.
pub async fn run_reconciliation(
    pool: &DbPool,
    auth: &AuthContext,
) -> Result<ReconciliationRun, AppError> {
    auth.require_any(&[])?;

    let mut tx = pool.begin().await?;

    let positions = sqlx::query_as::<_, LedgerPosition>(
        r#"
        SELECT
            a.id AS account_id,
            a.account_number,
            a.currency,
            a.balance_cents,
            (
                COALESCE((
                    SELECT SUM(t.amount_cents) FROM transactions t
                    WHERE t.to_account_id = a.id AND t.status = 'completed'
                ), 0)
                - COALESCE((
                    SELECT SUM(t.amount_cents) FROM transactions t
                    WHERE t.from_account_id = a.id AND t.status = 'completed'
                ), 0)
            )::BIGINT AS ledger_cents
        FROM accounts a
        WHERE a.tenant_id = $1 AND a.status <> 'closed'
        ORDER BY a.account_number
        "#,
    )
    .bind(auth.tenant_id)
    .fetch_all(&mut *tx)
    .await?;

    let (mismatches, report) = build_report(&positions);

    let run = sqlx::query_as::<_, ReconciliationRun>(
        r#"
        INSERT INTO reconciliation_runs (tenant_id, accounts_checked, mismatches, report)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(positions.len() as i32)
    .bind(mismatches.len() as i32)
    .bind(&report)
    .fetch_one(&mut *tx)
    .await?;

    for mismatch in &mismatches {
        alert_service::raise(
            &mut *tx,
            auth.tenant_id,
            NewAlert {
                alert_type: AlertType::ReconciliationMismatch,
                severity: Severity::Critical,
                entity_type: "account",
                entity_id: Some(mismatch.account_id),
                message: format!(
                    "Account {} balance {} {} differs from ledger {} by {}",
                    mismatch.account_number,
                    mismatch.stored_balance,
                    mismatch.currency,
                    mismatch.ledger_balance,
                    mismatch.difference
                ),
            },
        )
        .await?;
    }

    audit_service::record(
        &mut *tx,
        auth,
        "reconciliation.run",
        "reconciliation_run",
        Some(run.id),
        Some(serde_json::json!({
            "accounts_checked": run.accounts_checked,
            "mismatches": run.mismatches,
        })),
    )
    .await?;

    tx.commit().await?;

    if run.mismatches > 0 {
        tracing::warn!(
            "reconciliation {} found {} mismatches in {} accounts",
            run.id,
            run.mismatches,
            run.accounts_checked
        );
    } else {
        tracing::info!("reconciliation {} clean, {} accounts", run.id, run.accounts_checked);
    }

    Ok(run)
}

pub async fn get_run(pool: &DbPool, auth: &AuthContext, run_id: Uuid) -> Result<ReconciliationRun, AppError> {
    auth.require_any(&[])?;

    sqlx::query_as::<_, ReconciliationRun>(
        "SELECT * FROM reconciliation_runs WHERE id = $1 AND tenant_id = $2",
    )
    .bind(run_id)
    .bind(auth.tenant_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Reconciliation run"))
}

/// Newest first; `limit` defaults to 20, at most 100.
pub async fn list_runs(
    pool: &DbPool,
    auth: &AuthContext,
    limit: Option<i64>,
) -> Result<Vec<ReconciliationRun>, AppError> {
    auth.require_any(&[])?;

    let page = Page::new(limit, None, 20, 100);

    let runs = sqlx::query_as::<_, ReconciliationRun>(
        r#"
        SELECT * FROM reconciliation_runs
        WHERE tenant_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(auth.tenant_id)
    .bind(page.limit)
    .fetch_all(pool)
    .await?;

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{middleware::auth::test_context, models::api_key::Role};

    fn position(number: &str, balance_cents: i64, ledger_cents: i64) -> LedgerPosition {
        LedgerPosition {
            account_id: Uuid::new_v4(),
            account_number: number.to_string(),
            currency: "USD".to_string(),
            balance_cents,
            ledger_cents,
        }
    }

    #[test]
    fn report_lists_only_mismatches() {
        let positions = vec![
            position("1000000001", 5_000, 5_000),
            position("1000000002", 7_500, 7_000),
            position("1000000003", 0, 100),
        ];
        let (mismatches, report) = build_report(&positions);

        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].account_number, "1000000002");
        assert_eq!(report["accounts_checked"], 3);
        assert_eq!(report["net_difference_cents"], 400);
        assert_eq!(report["mismatches"][1]["difference"], "-1.00");
    }

    #[test]
    fn clean_ledger_has_empty_report() {
        let (mismatches, report) = build_report(&[position("1000000001", 10, 10)]);
        assert!(mismatches.is_empty());
        assert_eq!(report["mismatches"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn reconciliation_is_admin_only() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let result = run_reconciliation(&pool, &test_context(Role::Auditor)).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }
}
