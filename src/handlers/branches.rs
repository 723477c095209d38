//! Branch HTTP handlers.

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Json, Path}, respond, respond_list},
    middleware::auth::AuthContext,
    models::branch::{
        BranchResponse, BranchStatusRequest, BranchSummary, CashAdjustmentRequest,
        CreateBranchRequest,
    },
    services::branch_service,
};

pub async fn create_branch(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateBranchRequest>,
) -> ApiResult<BranchResponse> {
    let branch = branch_service::create_branch(&pool, &auth, request).await?;
    respond(branch.into(), "Branch created")
}

pub async fn list_branches(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Vec<BranchResponse>> {
    let branches = branch_service::list_branches(&pool, &auth).await?;
    respond_list(branches, "Branches retrieved")
}

pub async fn get_branch(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(branch_id): Path<Uuid>,
) -> ApiResult<BranchResponse> {
    let branch = branch_service::get_branch(&pool, &auth, branch_id).await?;
    respond(branch.into(), "Branch retrieved")
}

pub async fn set_branch_status(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(branch_id): Path<Uuid>,
    Json(request): Json<BranchStatusRequest>,
) -> ApiResult<BranchResponse> {
    let branch = branch_service::set_branch_status(&pool, &auth, branch_id, request.status).await?;
    respond(branch.into(), "Branch status updated")
}

/// Positive `delta_cents` adds cash to the vault, negative removes it.
/// Rejected when the branch is closed or the vault would go negative.
pub async fn adjust_cash(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(branch_id): Path<Uuid>,
    Json(request): Json<CashAdjustmentRequest>,
) -> ApiResult<BranchResponse> {
    let branch = branch_service::adjust_cash(&pool, &auth, branch_id, request).await?;
    respond(branch.into(), "Cash on hand adjusted")
}

pub async fn branch_summary(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(branch_id): Path<Uuid>,
) -> ApiResult<BranchSummary> {
    let summary = branch_service::branch_summary(&pool, &auth, branch_id).await?;
    respond(summary, "Branch summary retrieved")
}
