//! Credit assessment HTTP handlers.

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Json, Path, Query}, respond, respond_list},
    middleware::auth::AuthContext,
    models::credit::{AssessmentListQuery, CreditAssessmentRequest, CreditAssessmentResponse},
    services::credit_service,
    state::AppState,
};

/// `POST /api/v1/credit/assessments`
///
/// The decision is part of the data (`approved`, `referred` or `declined`);
/// a declined application is not an error.
pub async fn assess_credit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreditAssessmentRequest>,
) -> ApiResult<CreditAssessmentResponse> {
    let assessment =
        credit_service::assess_credit(&state.pool, &state.config, &auth, request).await?;
    respond(assessment.into(), "Credit assessment completed")
}

pub async fn get_assessment(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(assessment_id): Path<Uuid>,
) -> ApiResult<CreditAssessmentResponse> {
    let assessment = credit_service::get_assessment(&pool, &auth, assessment_id).await?;
    respond(assessment.into(), "Credit assessment retrieved")
}

pub async fn list_assessments(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AssessmentListQuery>,
) -> ApiResult<Vec<CreditAssessmentResponse>> {
    let assessments = credit_service::list_assessments(&pool, &auth, query.customer_id).await?;
    respond_list(assessments, "Credit assessments retrieved")
}
