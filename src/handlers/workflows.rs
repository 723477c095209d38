//! Approval workflow HTTP handlers.
//!
//! - POST /api/v1/workflows                manual submission
//! - GET  /api/v1/workflows?status=&required_role=
//! - GET  /api/v1/workflows/{id}
//! - POST /api/v1/workflows/{id}/approve
//! - POST /api/v1/workflows/{id}/reject

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Json, Path, Query}, respond, respond_list},
    middleware::auth::AuthContext,
    models::workflow::{ApprovalResponse, DecisionRequest, SubmitRequest, WorkflowListQuery},
    services::workflow_service,
};

pub async fn submit_request(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<ApprovalResponse> {
    let created = workflow_service::submit_request(&pool, &auth, request).await?;
    respond(created.into(), "Approval request submitted")
}

pub async fn list_requests(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<WorkflowListQuery>,
) -> ApiResult<Vec<ApprovalResponse>> {
    let requests = workflow_service::list_requests(&pool, &auth, &query).await?;
    respond_list(requests, "Approval requests retrieved")
}

pub async fn get_request(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<ApprovalResponse> {
    let request = workflow_service::get_request(&pool, &auth, request_id).await?;
    respond(request.into(), "Approval request retrieved")
}

/// Approve a pending request. Approving a large transfer executes it in the
/// same database transaction; approving a closure closes the account.
///
/// # Errors
///
/// - **403**: caller lacks the routed role, or is the requester
/// - **409**: request already decided, or the approved action is no longer possible
pub async fn approve(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<ApprovalResponse> {
    let decided = workflow_service::approve(&pool, &auth, request_id, request.note).await?;
    respond(decided.into(), "Request approved")
}

pub async fn reject(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<ApprovalResponse> {
    let decided = workflow_service::reject(&pool, &auth, request_id, request.note).await?;
    respond(decided.into(), "Request rejected")
}
