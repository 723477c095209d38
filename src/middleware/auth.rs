//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and verify it exists in the database
//! 3. Inject authentication context (tenant and role) into the request
//! 4. Reject unauthorized requests with HTTP 401

use std::str::FromStr;

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, Role},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Handlers extract it with `Extension<AuthContext>`; services take it by
/// reference to scope queries to the tenant and to record the actor.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated API key
    pub api_key_id: Uuid,

    /// Tenant (bank) the key belongs to. Every query filters by it.
    pub tenant_id: Uuid,

    /// Owner of the key, written to audit logs as the actor
    pub label: String,

    pub role: Role,
}

impl AuthContext {
    /// Fail with `Forbidden` unless the caller holds one of `roles`.
    /// Admins pass every check.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.role == Role::Admin || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Hash a raw API key the way it is stored in `api_keys.key_hash`.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pull the token out of `Authorization: Bearer <key>`.
fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(AppError::InvalidApiKey)
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Query database for matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = bearer_token(
        request
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok()),
    )?;

    let key_hash = hash_api_key(api_key);

    let api_key_record = sqlx::query_as::<_, ApiKey>(
        "SELECT id, tenant_id, key_hash, label, role, created_at, is_active
         FROM api_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidApiKey)?;

    // A key with a role this build does not know is treated as invalid
    let role = Role::from_str(&api_key_record.role).map_err(|_| {
        tracing::warn!(
            "API key {} has unknown role {}",
            api_key_record.id,
            api_key_record.role
        );
        AppError::InvalidApiKey
    })?;

    let auth_context = AuthContext {
        api_key_id: api_key_record.id,
        tenant_id: api_key_record.tenant_id,
        label: api_key_record.label,
        role,
    };

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
pub(crate) fn test_context(role: Role) -> AuthContext {
    AuthContext {
        api_key_id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        label: "test-key".to_string(),
        role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc123")).unwrap(), "abc123");
        assert!(bearer_token(Some("Basic abc123")).is_err());
        assert!(bearer_token(Some("Bearer ")).is_err());
        assert!(bearer_token(None).is_err());
    }

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn admin_passes_every_role_check() {
        let admin = test_context(Role::Admin);
        assert!(admin.require_any(&[Role::Auditor]).is_ok());

        let operator = test_context(Role::Operator);
        assert!(matches!(
            operator.require_any(&[Role::Auditor, Role::Supervisor]),
            Err(AppError::Forbidden)
        ));
        assert!(operator.require_any(&[Role::Operator]).is_ok());
    }
}
