//! Statement HTTP handlers.
//!
//! - POST /api/v1/accounts/{id}/statements    generate
//! - GET  /api/v1/accounts/{id}/statements    list (metadata)
//! - GET  /api/v1/statements/{id}             metadata
//! - GET  /api/v1/statements/{id}/download    decrypted PDF

use axum::{
    Extension,
    extract::State,
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    handlers::{ApiResult, extract::{Json, Path}, respond, respond_list},
    middleware::auth::AuthContext,
    models::statement::{GenerateStatementRequest, StatementResponse},
    services::statement_service,
    state::AppState,
};

/// Generate a statement for a period.
///
/// # Request Body
///
/// ```json
/// { "period_start": "2025-05-01", "period_end": "2025-05-31" }
/// ```
///
/// The period may not end in the future or span more than 366 days.
pub async fn generate_statement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<GenerateStatementRequest>,
) -> ApiResult<StatementResponse> {
    let statement =
        statement_service::generate_statement(&state.pool, &state.config, &auth, account_id, request)
            .await?;
    respond(statement.into(), "Statement generated")
}

pub async fn list_statements(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Vec<StatementResponse>> {
    let statements = statement_service::list_statements(&pool, &auth, account_id).await?;
    respond_list(statements, "Statements retrieved")
}

pub async fn get_statement(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(statement_id): Path<Uuid>,
) -> ApiResult<StatementResponse> {
    let statement = statement_service::get_statement(&pool, &auth, statement_id).await?;
    respond(statement.into(), "Statement retrieved")
}

/// Raw PDF, not wrapped in the envelope. Failures still answer with the
/// JSON failure envelope.
pub async fn download_statement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(statement_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (statement, pdf) =
        statement_service::download_statement(&state.pool, &state.config, &auth, statement_id)
            .await?;

    let filename = format!(
        "statement-{}-{}.pdf",
        statement.period_start, statement.period_end
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    ))
}
