//! Admin dashboard figures for one tenant.

use chrono::Utc;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        api_key::Role,
        dashboard::{CurrencyTotal, DashboardOverview, StatusCount},
        money,
    },
};

fn currency_totals(rows: Vec<(String, i64)>) -> Vec<CurrencyTotal> {
    rows.into_iter()
        .map(|(currency, cents)| CurrencyTotal {
            currency,
            total: money::cents_to_string(cents),
        })
        .collect()
}

/// Acknowledged alerts are being worked on and no longer count as open.
const OPEN_ALERTS_BY_SEVERITY: &str = r#"
    SELECT severity AS status, COUNT(*) AS count
    FROM alerts
    WHERE tenant_id = $1 AND status = 'open'
    GROUP BY severity
    ORDER BY severity
"#;

async fn count_by(pool: &DbPool, auth: &AuthContext, sql: &str) -> Result<Vec<StatusCount>, AppError> {
    let rows = sqlx::query_as::<_, StatusCount>(sql)
        .bind(auth.tenant_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Access
///
/// Admins and auditors.
pub async fn overview(pool: &DbPool, auth: &AuthContext) -> Result<DashboardOverview, AppError> {
    auth.require_any(&[Role::Auditor])?;

    let customer_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE tenant_id = $1")
            .bind(auth.tenant_id)
            .fetch_one(pool)
            .await?;

    let accounts_by_status = count_by(
        pool,
        auth,
        "SELECT status, COUNT(*) AS count FROM accounts WHERE tenant_id = $1 GROUP BY status ORDER BY status",
    )
    .await?;

    let cards_by_status = count_by(
        pool,
        auth,
        "SELECT status, COUNT(*) AS count FROM cards WHERE tenant_id = $1 GROUP BY status ORDER BY status",
    )
    .await?;

    let open_alerts_by_severity = count_by(pool, auth, OPEN_ALERTS_BY_SEVERITY).await?;

    let deposits: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT currency, COALESCE(SUM(balance_cents), 0)::BIGINT
        FROM accounts
        WHERE tenant_id = $1 AND status <> 'closed'
        GROUP BY currency
        ORDER BY currency
        "#,
    )
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    let pending_approvals: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM approval_requests WHERE tenant_id = $1 AND status = 'pending'",
    )
    .bind(auth.tenant_id)
    .fetch_one(pool)
    .await?;

    let volume: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT currency, COUNT(*), COALESCE(SUM(amount_cents), 0)::BIGINT
        FROM transactions
        WHERE tenant_id = $1
          AND status = 'completed'
          AND created_at >= NOW() - INTERVAL '24 hours'
        GROUP BY currency
        ORDER BY currency
        "#,
    )
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    let transactions_last_24h = volume.iter().map(|(_, count, _)| count).sum();
    let volume_last_24h =
        currency_totals(volume.into_iter().map(|(currency, _, cents)| (currency, cents)).collect());

    Ok(DashboardOverview {
        customer_count,
        accounts_by_status,
        deposits_by_currency: currency_totals(deposits),
        cards_by_status,
        pending_approvals,
        open_alerts_by_severity,
        transactions_last_24h,
        volume_last_24h,
        generated_at: Utc::now(),
    })
}
