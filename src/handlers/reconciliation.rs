//! Wallet reconciliation HTTP handlers. Admin only.

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Path, Query}, respond, respond_list},
    middleware::auth::AuthContext,
    models::reconciliation::{ReconciliationResponse, RunListQuery},
    services::reconciliation_service,
};

/// Start a run. Mismatching accounts raise critical alerts; the report is
/// part of the response.
pub async fn run_reconciliation(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ReconciliationResponse> {
    let run = reconciliation_service::run_reconciliation(&pool, &auth).await?;
    let message = if run.mismatches == 0 {
        "Reconciliation completed, no mismatches"
    } else {
        "Reconciliation completed with mismatches"
    };
    respond(run.into(), message)
}

pub async fn list_runs(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<RunListQuery>,
) -> ApiResult<Vec<ReconciliationResponse>> {
    let runs = reconciliation_service::list_runs(&pool, &auth, query.limit).await?;
    respond_list(runs, "Reconciliation runs retrieved")
}

pub async fn get_run(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(run_id): Path<Uuid>,
) -> ApiResult<ReconciliationResponse> {
    let run = reconciliation_service::get_run(&pool, &auth, run_id).await?;
    respond(run.into(), "Reconciliation run retrieved")
}
