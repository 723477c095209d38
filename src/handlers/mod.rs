//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Calls the matching service with the caller's `AuthContext`
//! 3. Wraps the result in the `ApiResponse` envelope
//!
//! Errors bubble up as `AppError` and become failure envelopes in
//! `AppError::into_response`.

use axum::Json;

use crate::{error::AppError, models::envelope::ApiResponse};

pub mod accounts;
pub mod alerts;
pub mod audit;
pub mod branches;
pub mod cards;
pub mod credit;
pub mod customers;
pub mod dashboard;
pub mod extract;
pub mod health;
pub mod reconciliation;
pub mod statements;
pub mod transactions;
pub mod workflows;

/// What every JSON handler returns.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub(crate) fn respond<T>(data: T, message: &str) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data, message)))
}

/// Map rows to DTOs for list endpoints.
pub(crate) fn respond_list<R, T: From<R>>(rows: Vec<R>, message: &str) -> ApiResult<Vec<T>> {
    respond(rows.into_iter().map(Into::into).collect(), message)
}
