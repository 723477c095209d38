//! Alert HTTP handlers.

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Path, Query}, respond},
    middleware::auth::AuthContext,
    models::alert::{Alert, AlertGroup, AlertListQuery},
    services::alert_service,
};

pub async fn list_alerts(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AlertListQuery>,
) -> ApiResult<Vec<Alert>> {
    let alerts = alert_service::list_alerts(&pool, &auth, &query).await?;
    respond(alerts, "Alerts retrieved")
}

/// Counts per (type, severity) with the latest occurrence.
pub async fn aggregate_alerts(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Vec<AlertGroup>> {
    let groups = alert_service::aggregate_alerts(&pool, &auth).await?;
    respond(groups, "Alert summary retrieved")
}

pub async fn acknowledge(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(alert_id): Path<Uuid>,
) -> ApiResult<Alert> {
    let alert = alert_service::acknowledge(&pool, &auth, alert_id).await?;
    respond(alert, "Alert acknowledged")
}

pub async fn resolve(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(alert_id): Path<Uuid>,
) -> ApiResult<Alert> {
    let alert = alert_service::resolve(&pool, &auth, alert_id).await?;
    respond(alert, "Alert resolved")
}
