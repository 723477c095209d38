//! API Key model for authentication.
//!
//! API keys identify a staff member or integration inside one tenant (bank).
//! They are stored in the database as SHA-256 hashes and carry a role that
//! gates the privileged endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `tenant_id`: The bank this key operates in
/// - `key_hash`: SHA-256 hash of the actual API key
/// - `label`: Human-readable owner, recorded as the actor in audit logs
/// - `role`: One of [`Role`]
/// - `is_active`: Whether the key is currently valid
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub key_hash: String,

    pub label: String,

    pub role: String,

    pub created_at: DateTime<Utc>,

    /// Inactive keys are rejected during authentication.
    pub is_active: bool,
}

/// Staff roles. `Admin` passes every role check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Operator,
    Supervisor,
    BranchManager,
    CreditOfficer,
    RiskCommittee,
    Auditor,
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roles_round_trip_through_snake_case() {
        assert_eq!(Role::from_str("branch_manager").unwrap(), Role::BranchManager);
        assert_eq!(Role::RiskCommittee.as_ref(), "risk_committee");
        assert!(Role::from_str("superuser").is_err());
    }
}
