//! Customer records and KYC status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Represents a customer record from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub kyc_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Know-your-customer review state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    /// Allowed moves: a pending review is decided, a rejected customer may re-submit.
    pub fn can_transition_to(self, next: KycStatus) -> bool {
        matches!(
            (self, next),
            (KycStatus::Pending, KycStatus::Verified)
                | (KycStatus::Pending, KycStatus::Rejected)
                | (KycStatus::Rejected, KycStatus::Pending)
        )
    }
}

/// Request body for registering a customer.
///
/// # JSON Example
///
/// ```json
/// {
///   "full_name": "Ada Lovelace",
///   "email": "ada@example.com",
///   "phone": "+447700900123",
///   "date_of_birth": "1990-12-10",
///   "branch_id": null
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKycRequest {
    pub status: KycStatus,
}

/// Query string for `GET /api/v1/customers`.
#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
    pub kyc_status: Option<KycStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub branch_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub kyc_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Removes the internal `tenant_id`.
impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            branch_id: customer.branch_id,
            full_name: customer.full_name,
            email: customer.email,
            phone: customer.phone,
            date_of_birth: customer.date_of_birth,
            kyc_status: customer.kyc_status,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}
