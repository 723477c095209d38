//! Customer HTTP handlers.
//!
//! - POST  /api/v1/customers
//! - GET   /api/v1/customers
//! - GET   /api/v1/customers/{id}
//! - PATCH /api/v1/customers/{id}
//! - PUT   /api/v1/customers/{id}/kyc

use axum::{Extension, extract::State};
use uuid::Uuid;

use crate::{
    db::DbPool,
    handlers::{ApiResult, extract::{Json, Path, Query}, respond, respond_list},
    middleware::auth::AuthContext,
    models::customer::{
        CreateCustomerRequest, CustomerListQuery, CustomerResponse, UpdateContactRequest,
        UpdateKycRequest,
    },
    services::customer_service,
};

/// Register a customer. KYC starts `pending`.
///
/// # Errors
///
/// - **400**: invalid name, email, phone or an applicant under 18
/// - **409**: email already registered in this bank
pub async fn create_customer(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateCustomerRequest>,
) -> ApiResult<CustomerResponse> {
    let customer = customer_service::create_customer(&pool, &auth, request).await?;
    respond(customer.into(), "Customer created")
}

pub async fn list_customers(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CustomerListQuery>,
) -> ApiResult<Vec<CustomerResponse>> {
    let customers = customer_service::list_customers(&pool, &auth, &query).await?;
    respond_list(customers, "Customers retrieved")
}

pub async fn get_customer(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(customer_id): Path<Uuid>,
) -> ApiResult<CustomerResponse> {
    let customer = customer_service::get_customer(&pool, &auth, customer_id).await?;
    respond(customer.into(), "Customer retrieved")
}

pub async fn update_contact(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<UpdateContactRequest>,
) -> ApiResult<CustomerResponse> {
    let customer = customer_service::update_contact(&pool, &auth, customer_id, request).await?;
    respond(customer.into(), "Contact details updated")
}

/// `pending -> verified | rejected`, `rejected -> pending`.
pub async fn update_kyc_status(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<UpdateKycRequest>,
) -> ApiResult<CustomerResponse> {
    let customer =
        customer_service::update_kyc_status(&pool, &auth, customer_id, request.status).await?;
    respond(customer.into(), "KYC status updated")
}
