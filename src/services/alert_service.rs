//! Alert raising, listing, aggregation and triage.

use std::str::FromStr;

use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        alert::{Alert, AlertGroup, AlertListQuery, AlertStatus, NewAlert},
        api_key::Role,
    },
    services::audit_service,
};

/// Insert an alert. Runs on whatever executor the caller is using so
/// alerts raised inside a transaction roll back with it.
pub async fn raise<'e, E>(executor: E, tenant_id: Uuid, alert: NewAlert) -> Result<Alert, AppError>
where
    E: PgExecutor<'e>,
{
    let created = sqlx::query_as::<_, Alert>(
        r#"
        INSERT INTO alerts (tenant_id, alert_type, severity, entity_type, entity_id, message)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(alert.alert_type.as_ref())
    .bind(alert.severity.as_ref())
    .bind(alert.entity_type)
    .bind(alert.entity_id)
    .bind(&alert.message)
    .fetch_one(executor)
    .await?;

    tracing::warn!(
        "alert raised: {} ({}) {}",
        created.alert_type,
        created.severity,
        created.message
    );

    Ok(created)
}

/// List alerts, newest first, optionally filtered by status and severity.
pub async fn list_alerts(
    pool: &DbPool,
    auth: &AuthContext,
    query: &AlertListQuery,
) -> Result<Vec<Alert>, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager, Role::Auditor])?;

    let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM alerts WHERE tenant_id = ");
    builder.push_bind(auth.tenant_id);

    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
    if let Some(severity) = query.severity {
        builder.push(" AND severity = ").push_bind(severity.as_ref().to_string());
    }
    builder.push(" ORDER BY created_at DESC LIMIT 500");

    let alerts = builder.build_query_as::<Alert>().fetch_all(pool).await?;
    Ok(alerts)
}

/// Count alerts per (type, severity).
///
/// Groups with open alerts come first, then by most recent activity.
pub async fn aggregate_alerts(pool: &DbPool, auth: &AuthContext) -> Result<Vec<AlertGroup>, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager, Role::Auditor])?;

    let groups = sqlx::query_as::<_, AlertGroup>(
        r#"
        SELECT alert_type,
               severity,
               COUNT(*) FILTER (WHERE status <> 'resolved') AS open_count,
               COUNT(*) AS total_count,
               MAX(created_at) AS latest_at
        FROM alerts
        WHERE tenant_id = $1
        GROUP BY alert_type, severity
        ORDER BY open_count DESC, latest_at DESC
        "#,
    )
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(groups)
}

/// `open -> acknowledged`
pub async fn acknowledge(pool: &DbPool, auth: &AuthContext, alert_id: Uuid) -> Result<Alert, AppError> {
    transition(pool, auth, alert_id, AlertStatus::Acknowledged).await
}

/// `open | acknowledged -> resolved`
pub async fn resolve(pool: &DbPool, auth: &AuthContext, alert_id: Uuid) -> Result<Alert, AppError> {
    transition(pool, auth, alert_id, AlertStatus::Resolved).await
}

async fn transition(
    pool: &DbPool,
    auth: &AuthContext,
    alert_id: Uuid,
    next: AlertStatus,
) -> Result<Alert, AppError> {
    auth.require_any(&[Role::Supervisor, Role::BranchManager])?;

    let mut tx = pool.begin().await?;

    let current: String =
        sqlx::query_scalar("SELECT status FROM alerts WHERE id = $1 AND tenant_id = $2 FOR UPDATE")
            .bind(alert_id)
            .bind(auth.tenant_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Alert"))?;

    let current = AlertStatus::from_str(&current)
        .map_err(|_| AppError::InvalidState(format!("Alert has unknown status {current}")))?;

    if !current.can_transition_to(next) {
        return Err(AppError::InvalidState(format!(
            "Alert cannot move from {current} to {next}"
        )));
    }

    let timestamp_column = match next {
        AlertStatus::Acknowledged => "acknowledged_at",
        _ => "resolved_at",
    };

    let alert = sqlx::query_as::<_, Alert>(&format!(
        "UPDATE alerts SET status = $1, {timestamp_column} = NOW() WHERE id = $2 RETURNING *"
    ))
    .bind(next.as_ref())
    .bind(alert_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        &format!("alert.{next}"),
        "alert",
        Some(alert_id),
        None,
    )
    .await?;

    tx.commit().await?;

    Ok(alert)
}
