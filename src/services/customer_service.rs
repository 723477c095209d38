//! Customer records: registration, search, contact changes and KYC review.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::customer::{
        CreateCustomerRequest, Customer, CustomerListQuery, KycStatus, UpdateContactRequest,
    },
    services::{Page, audit_service},
};

const MINIMUM_AGE_YEARS: i32 = 18;

/// `local@domain.tld` with no whitespace; deliberately loose.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    let invalid = || AppError::invalid("Invalid email address");

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(()),
        _ => Err(invalid()),
    }
}

/// E.164: `+` followed by 8 to 15 digits.
pub fn validate_phone(phone: &str) -> Result<(), AppError> {
    let digits = phone
        .strip_prefix('+')
        .ok_or_else(|| AppError::invalid("Phone number must start with +"))?;

    if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::invalid("Phone number must have 8 to 15 digits"))
    }
}

/// Full years between `date_of_birth` and `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

fn validate_new_customer(request: &CreateCustomerRequest, today: NaiveDate) -> Result<(), AppError> {
    if request.full_name.trim().is_empty() {
        return Err(AppError::invalid("Full name is required"));
    }
    validate_email(&request.email)?;
    validate_phone(&request.phone)?;

    if request.date_of_birth > today {
        return Err(AppError::invalid("Date of birth is in the future"));
    }
    if age_on(request.date_of_birth, today) < MINIMUM_AGE_YEARS {
        return Err(AppError::invalid(format!(
            "Customer must be at least {MINIMUM_AGE_YEARS} years old"
        )));
    }

    Ok(())
}

/// Translate a unique-constraint violation into `Conflict`.
pub(crate) fn map_unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        other => AppError::Database(other),
    }
}

pub async fn create_customer(
    pool: &DbPool,
    auth: &AuthContext,
    request: CreateCustomerRequest,
) -> Result<Customer, AppError> {
    validate_new_customer(&request, Utc::now().date_naive())?;

    let email = request.email.trim().to_lowercase();

    let mut tx = pool.begin().await?;

    if let Some(branch_id) = request.branch_id {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND tenant_id = $2)",
        )
        .bind(branch_id)
        .bind(auth.tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Branch"));
        }
    }

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (tenant_id, branch_id, full_name, email, phone, date_of_birth)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(request.branch_id)
    .bind(request.full_name.trim())
    .bind(&email)
    .bind(&request.phone)
    .bind(request.date_of_birth)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "A customer with this email already exists"))?;

    audit_service::record(&mut *tx, auth, "customer.created", "customer", Some(customer.id), None)
        .await?;

    tx.commit().await?;

    tracing::info!("customer {} registered", customer.id);

    Ok(customer)
}

pub async fn get_customer(
    pool: &DbPool,
    auth: &AuthContext,
    customer_id: Uuid,
) -> Result<Customer, AppError> {
    fetch_customer(pool, auth.tenant_id, customer_id).await
}

/// Tenant-scoped lookup shared with other services.
pub async fn fetch_customer<'e, E>(
    executor: E,
    tenant_id: Uuid,
    customer_id: Uuid,
) -> Result<Customer, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1 AND tenant_id = $2")
        .bind(customer_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Customer"))
}

/// Newest first. `search` matches name or email, case-insensitively.
pub async fn list_customers(
    pool: &DbPool,
    auth: &AuthContext,
    query: &CustomerListQuery,
) -> Result<Vec<Customer>, AppError> {
    let page = Page::new(query.limit, query.offset, 50, 200);

    let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM customers WHERE tenant_id = ");
    builder.push_bind(auth.tenant_id);

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = query.kyc_status {
        builder.push(" AND kyc_status = ").push_bind(status.as_ref().to_string());
    }

    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let customers = builder.build_query_as::<Customer>().fetch_all(pool).await?;
    Ok(customers)
}

/// Escape LIKE wildcards in user input.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub async fn update_contact(
    pool: &DbPool,
    auth: &AuthContext,
    customer_id: Uuid,
    request: UpdateContactRequest,
) -> Result<Customer, AppError> {
    if request.email.is_none() && request.phone.is_none() {
        return Err(AppError::invalid("Nothing to update"));
    }
    if let Some(ref email) = request.email {
        validate_email(email)?;
    }
    if let Some(ref phone) = request.phone {
        validate_phone(phone)?;
    }

    let mut tx = pool.begin().await?;

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
        SET email = COALESCE($1, email),
            phone = COALESCE($2, phone),
            updated_at = NOW()
        WHERE id = $3 AND tenant_id = $4
        RETURNING *
        "#,
    )
    .bind(request.email.map(|e| e.trim().to_lowercase()))
    .bind(request.phone)
    .bind(customer_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "A customer with this email already exists"))?
    .ok_or(AppError::NotFound("Customer"))?;

    audit_service::record(&mut *tx, auth, "customer.contact_updated", "customer", Some(customer_id), None)
        .await?;

    tx.commit().await?;

    Ok(customer)
}

pub async fn update_kyc_status(
    pool: &DbPool,
    auth: &AuthContext,
    customer_id: Uuid,
    next: KycStatus,
) -> Result<Customer, AppError> {
    let mut tx = pool.begin().await?;

    let current: String = sqlx::query_scalar(
        "SELECT kyc_status FROM customers WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(customer_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Customer"))?;

    let current = KycStatus::from_str(&current)
        .map_err(|_| AppError::InvalidState(format!("Unknown KYC status {current}")))?;

    if !current.can_transition_to(next) {
        return Err(AppError::InvalidState(format!(
            "KYC status cannot change from {current} to {next}"
        )));
    }

    let customer = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET kyc_status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(next.as_ref())
    .bind(customer_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "customer.kyc_updated",
        "customer",
        Some(customer_id),
        Some(serde_json::json!({ "from": current, "to": next })),
    )
    .await?;

    tx.commit().await?;

    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn emails() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("a.b+tag@mail.example.co").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@@example.com").is_err());
        assert!(validate_email("ada @example.com").is_err());
        assert!(validate_email("ada@.com").is_err());
    }

    #[test]
    fn phones() {
        assert!(validate_phone("+447700900123").is_ok());
        assert!(validate_phone("+12345678").is_ok());
        assert!(validate_phone("447700900123").is_err());
        assert!(validate_phone("+1234567").is_err());
        assert!(validate_phone("+1234567890123456").is_err());
        assert!(validate_phone("+44 7700 900123").is_err());
    }

    #[test]
    fn age_counts_full_years() {
        assert_eq!(age_on(date(2000, 6, 15), date(2018, 6, 14)), 17);
        assert_eq!(age_on(date(2000, 6, 15), date(2018, 6, 15)), 18);
        assert_eq!(age_on(date(2000, 2, 29), date(2018, 2, 28)), 17);
        assert_eq!(age_on(date(2000, 2, 29), date(2018, 3, 1)), 18);
    }

    #[test]
    fn minors_are_rejected() {
        let request = CreateCustomerRequest {
            full_name: "Young Person".to_string(),
            email: "young@example.com".to_string(),
            phone: "+15550001111".to_string(),
            date_of_birth: date(2010, 1, 1),
            branch_id: None,
        };
        assert!(matches!(
            validate_new_customer(&request, date(2025, 1, 1)),
            Err(AppError::InvalidRequest(_))
        ));
        assert!(validate_new_customer(&request, date(2028, 1, 1)).is_ok());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
