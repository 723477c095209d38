//! Audit trail.
//!
//! Mutating services call [`record`] inside their own database transaction
//! so the audit row commits or rolls back with the change it describes.

use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::{api_key::Role, audit::{AuditLog, AuditLogFilter}},
    services::Page,
};

/// Append one audit entry.
pub async fn record<'e, E>(
    executor: E,
    auth: &AuthContext,
    action: &str,
    entity_type: &str,
    entity_id: Option<Uuid>,
    details: Option<serde_json::Value>,
) -> Result<(), AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_logs (tenant_id, actor, action, entity_type, entity_id, details)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(auth.tenant_id)
    .bind(&auth.label)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(details)
    .execute(executor)
    .await?;

    Ok(())
}

/// Search the audit trail of the caller's tenant.
///
/// # Access
///
/// Auditors and admins only.
///
/// # Ordering
///
/// Newest first. `limit` defaults to 50 and is clamped to 1..=500.
pub async fn list_audit_logs(
    pool: &DbPool,
    auth: &AuthContext,
    filter: &AuditLogFilter,
) -> Result<Vec<AuditLog>, AppError> {
    auth.require_any(&[Role::Auditor])?;

    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            return Err(AppError::invalid("'from' must not be after 'to'"));
        }
    }

    let page = Page::new(filter.limit, filter.offset, 50, 500);
    let mut query = build_filter_query(auth.tenant_id, filter, page);

    let logs = query.build_query_as::<AuditLog>().fetch_all(pool).await?;

    Ok(logs)
}

fn build_filter_query(
    tenant_id: Uuid,
    filter: &AuditLogFilter,
    page: Page,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT id, tenant_id, actor, action, entity_type, entity_id, details, created_at \
         FROM audit_logs WHERE tenant_id = ",
    );
    query.push_bind(tenant_id);

    if let Some(ref actor) = filter.actor {
        query.push(" AND actor = ").push_bind(actor.clone());
    }
    if let Some(ref action) = filter.action {
        // `card.` matches every card action
        if action.ends_with('.') {
            query.push(" AND action LIKE ").push_bind(format!("{action}%"));
        } else {
            query.push(" AND action = ").push_bind(action.clone());
        }
    }
    if let Some(ref entity_type) = filter.entity_type {
        query.push(" AND entity_type = ").push_bind(entity_type.clone());
    }
    if let Some(entity_id) = filter.entity_id {
        query.push(" AND entity_id = ").push_bind(entity_id);
    }
    if let Some(from) = filter.from {
        query.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND created_at <= ").push_bind(to);
    }

    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_query_only_scopes_tenant() {
        let query = build_filter_query(Uuid::new_v4(), &AuditLogFilter::default(), Page::new(None, None, 50, 500));
        let sql = query.sql();
        assert!(sql.contains("WHERE tenant_id = $1"));
        assert!(sql.ends_with("ORDER BY created_at DESC LIMIT $2 OFFSET $3"));
        assert!(!sql.contains("actor ="));
    }

    #[test]
    fn filters_add_numbered_binds_in_order() {
        let filter = AuditLogFilter {
            actor: Some("teller-7".to_string()),
            action: Some("card.".to_string()),
            entity_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let query = build_filter_query(Uuid::new_v4(), &filter, Page::new(Some(10), None, 50, 500));
        let sql = query.sql();
        assert!(sql.contains("AND actor = $2"));
        assert!(sql.contains("AND action LIKE $3"));
        assert!(sql.contains("AND entity_id = $4"));
        assert!(sql.contains("LIMIT $5 OFFSET $6"));
    }

    #[tokio::test]
    async fn operators_cannot_read_audit_logs() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let auth = crate::middleware::auth::test_context(Role::Operator);
        let result = list_audit_logs(&pool, &auth, &AuditLogFilter::default()).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }
}
