//! Card service: payment-card validation and lifecycle.
//!
//! Validation happens before anything touches the database:
//! normalization, Luhn checksum, brand detection, expiry and CVV checks.
//! Only brand, last four digits and a tenant-salted fingerprint are stored.
//!
//! # Default card invariant
//!
//! A customer with at least one card that is neither removed nor blocked has
//! exactly one default card. Every operation that can break this runs under
//! a lock on the customer row and repairs the default before committing; a
//! partial unique index rejects two defaults outright.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    clients::{
        sms::SmsClient,
        three_ds::{AuthenticationRequest, ThreeDsClient, ThreeDsOutcome},
    },
    db::DbPool,
    error::AppError,
    luhn,
    middleware::auth::AuthContext,
    models::{
        alert::{AlertType, NewAlert, Severity},
        card::{AddCardRequest, Card, CardBrand, CardStatus},
    },
    services::{alert_service, audit_service, customer_service},
};

/// Failed 3DS attempts before a card is blocked.
pub const MAX_FAILED_VERIFICATIONS: i32 = 3;

/// Expiry dates further out than this are rejected as typos.
const MAX_YEARS_AHEAD: i32 = 20;

/// Strip spaces and dashes; what remains must be 12 to 19 digits.
pub fn normalize_card_number(raw: &str) -> Result<String, AppError> {
    let number: String = raw.chars().filter(|c| *c != ' ' && *c != '-').collect();

    if !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid("Card number may only contain digits"));
    }
    if !(12..=19).contains(&number.len()) {
        return Err(AppError::invalid("Card number must have 12 to 19 digits"));
    }

    Ok(number)
}

/// Identify the card network from the IIN prefix and the number length.
pub fn detect_brand(number: &str) -> Option<CardBrand> {
    let len = number.len();
    let prefix = |digits: usize| -> u32 {
        number
            .get(..digits)
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    };
    let long = (16..=19).contains(&len);

    if prefix(1) == 4 && matches!(len, 13 | 16 | 19) {
        return Some(CardBrand::Visa);
    }
    if ((51..=55).contains(&prefix(2)) || (2221..=2720).contains(&prefix(4))) && len == 16 {
        return Some(CardBrand::Mastercard);
    }
    if matches!(prefix(2), 34 | 37) && len == 15 {
        return Some(CardBrand::Amex);
    }
    if long
        && (prefix(4) == 6011
            || prefix(2) == 65
            || (644..=649).contains(&prefix(3))
            || (622_126..=622_925).contains(&prefix(6)))
    {
        return Some(CardBrand::Discover);
    }
    if long && (3528..=3589).contains(&prefix(4)) {
        return Some(CardBrand::Jcb);
    }
    if (14..=19).contains(&len) && ((300..=305).contains(&prefix(3)) || matches!(prefix(2), 36 | 38))
    {
        return Some(CardBrand::Diners);
    }
    if long && prefix(2) == 62 {
        return Some(CardBrand::UnionPay);
    }

    None
}

/// Validate an expiry against `today`. Returns (month, four-digit year).
///
/// A card is usable through the last day of its expiry month.
pub fn validate_expiry(month: u32, year: i32, today: NaiveDate) -> Result<(u32, i32), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::invalid("Expiry month must be between 1 and 12"));
    }

    let year = match year {
        0..=99 => 2000 + year,
        1000..=9999 => year,
        _ => return Err(AppError::invalid("Expiry year must have two or four digits")),
    };

    if (year, month) < (today.year(), today.month()) {
        return Err(AppError::invalid("Card has expired"));
    }
    if year > today.year() + MAX_YEARS_AHEAD {
        return Err(AppError::invalid("Expiry date is too far in the future"));
    }

    Ok((month, year))
}

pub fn validate_cvv(cvv: &str, brand: CardBrand) -> Result<(), AppError> {
    if cvv.len() == brand.cvv_length() && cvv.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::invalid(format!(
            "Security code must have {} digits",
            brand.cvv_length()
        )))
    }
}

/// SHA-256 of tenant id and card number, hex encoded. Salting with the tenant
/// keeps fingerprints from matching across banks.
pub fn fingerprint(tenant_id: Uuid, number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(number.as_bytes());
    hex::encode(hasher.finalize())
}

/// A card that passed every offline check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCard {
    pub brand: CardBrand,
    pub last4: String,
    pub number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

pub fn validate_card(request: &AddCardRequest, today: NaiveDate) -> Result<ValidatedCard, AppError> {
    if request.cardholder_name.trim().is_empty() {
        return Err(AppError::invalid("Cardholder name is required"));
    }

    let number = normalize_card_number(&request.card_number)?;

    if !luhn::is_valid(&number) {
        return Err(AppError::invalid("Card number failed checksum validation"));
    }

    let brand =
        detect_brand(&number).ok_or_else(|| AppError::invalid("Unsupported card brand"))?;

    let (expiry_month, expiry_year) =
        validate_expiry(request.expiry_month, request.expiry_year, today)?;

    validate_cvv(&request.cvv, brand)?;

    Ok(ValidatedCard {
        brand,
        last4: number[number.len() - 4..].to_string(),
        number,
        expiry_month,
        expiry_year,
    })
}

/// Check a lifecycle move and return the parsed current status.
pub fn ensure_transition(card: &Card, next: CardStatus) -> Result<CardStatus, AppError> {
    let current = CardStatus::from_str(&card.status)
        .map_err(|_| AppError::InvalidState(format!("Unknown card status {}", card.status)))?;

    if current.can_transition_to(next) {
        Ok(current)
    } else {
        Err(AppError::InvalidState(format!(
            "Card cannot move from {current} to {next}"
        )))
    }
}

/// Like [`ensure_transition`], but the card must also currently be in `from`.
pub fn ensure_transition_from(card: &Card, from: CardStatus, next: CardStatus) -> Result<(), AppError> {
    let current = ensure_transition(card, next)?;
    if current != from {
        return Err(AppError::InvalidState(format!(
            "Card must be {from} to become {next}, but is {current}"
        )));
    }
    Ok(())
}

fn eligible_for_default(card: &Card) -> bool {
    CardStatus::from_str(&card.status).is_ok_and(CardStatus::holds_default)
}

/// The card that should hold the customer's default: the current holder
/// while it stays eligible, otherwise the newest eligible card.
pub fn default_holder(cards: &[Card]) -> Option<Uuid> {
    if let Some(current) = cards.iter().find(|c| c.is_default && eligible_for_default(c)) {
        return Some(current.id);
    }

    cards
        .iter()
        .filter(|c| eligible_for_default(c))
        .max_by_key(|c| (c.created_at, c.id))
        .map(|c| c.id)
}

/// Flag updates that leave `target` as the customer's only default card.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DefaultChange {
    pub clear: Vec<Uuid>,
    pub set: Option<Uuid>,
}

pub fn plan_default_change(cards: &[Card], target: Option<Uuid>) -> DefaultChange {
    let clear = cards
        .iter()
        .filter(|c| c.is_default && Some(c.id) != target)
        .map(|c| c.id)
        .collect();
    let set = target.filter(|id| !cards.iter().any(|c| c.id == *id && c.is_default));

    DefaultChange { clear, set }
}

/// Serialize card operations per customer.
async fn lock_customer(conn: &mut PgConnection, tenant_id: Uuid, customer_id: Uuid) -> Result<(), AppError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM customers WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
    )
    .bind(customer_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Customer"))?;

    Ok(())
}

async fn fetch_card<'e, E>(executor: E, tenant_id: Uuid, card_id: Uuid) -> Result<Card, AppError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1 AND tenant_id = $2")
        .bind(card_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Card"))
}

/// Load a card and take the customer lock before anything changes.
async fn lock_card(conn: &mut PgConnection, tenant_id: Uuid, card_id: Uuid) -> Result<Card, AppError> {
    let card = fetch_card(&mut *conn, tenant_id, card_id).await?;
    lock_customer(conn, tenant_id, card.customer_id).await?;
    // Re-read under the lock
    fetch_card(&mut *conn, tenant_id, card_id).await
}

async fn customer_cards(conn: &mut PgConnection, customer_id: Uuid) -> Result<Vec<Card>, AppError> {
    let cards = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(cards)
}

/// Clear before set: the partial unique index forbids two defaults even mid-transaction.
async fn apply_default_change(conn: &mut PgConnection, change: &DefaultChange) -> Result<(), AppError> {
    if !change.clear.is_empty() {
        sqlx::query("UPDATE cards SET is_default = FALSE, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&change.clear)
            .execute(&mut *conn)
            .await?;
    }

    if let Some(card_id) = change.set {
        sqlx::query("UPDATE cards SET is_default = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(card_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Re-establish the default card invariant for a locked customer.
async fn repair_default(conn: &mut PgConnection, customer_id: Uuid) -> Result<(), AppError> {
    let cards = customer_cards(&mut *conn, customer_id).await?;
    let change = plan_default_change(&cards, default_holder(&cards));
    apply_default_change(conn, &change).await
}

/// Add a card after offline validation. Status starts `pending_verification`.
pub async fn add_card(
    pool: &DbPool,
    auth: &AuthContext,
    request: AddCardRequest,
) -> Result<Card, AppError> {
    let validated = validate_card(&request, Utc::now().date_naive())?;
    let fingerprint = fingerprint(auth.tenant_id, &validated.number);

    let mut tx = pool.begin().await?;

    lock_customer(&mut tx, auth.tenant_id, request.customer_id).await?;

    let duplicate: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM cards
            WHERE customer_id = $1 AND fingerprint = $2 AND status <> 'removed'
        )
        "#,
    )
    .bind(request.customer_id)
    .bind(&fingerprint)
    .fetch_one(&mut *tx)
    .await?;

    if duplicate {
        return Err(AppError::Conflict(
            "This card is already registered for the customer".to_string(),
        ));
    }

    let card = sqlx::query_as::<_, Card>(
        r#"
        INSERT INTO cards (
            tenant_id, customer_id, brand, last4, fingerprint, cardholder_name,
            expiry_month, expiry_year
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(auth.tenant_id)
    .bind(request.customer_id)
    .bind(validated.brand.as_ref())
    .bind(&validated.last4)
    .bind(&fingerprint)
    .bind(request.cardholder_name.trim())
    .bind(validated.expiry_month as i16)
    .bind(validated.expiry_year as i16)
    .fetch_one(&mut *tx)
    .await?;

    // The customer's first eligible card takes the default
    repair_default(&mut tx, card.customer_id).await?;
    let card = fetch_card(&mut *tx, auth.tenant_id, card.id).await?;

    audit_service::record(
        &mut *tx,
        auth,
        "card.added",
        "card",
        Some(card.id),
        Some(serde_json::json!({ "brand": card.brand, "last4": card.last4 })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!("card {} ({} {}) added", card.id, card.brand, card.last4);

    Ok(card)
}

/// Cards of a customer: default first, then newest.
pub async fn list_cards(
    pool: &DbPool,
    auth: &AuthContext,
    customer_id: Uuid,
) -> Result<Vec<Card>, AppError> {
    customer_service::fetch_customer(pool, auth.tenant_id, customer_id).await?;

    let cards = sqlx::query_as::<_, Card>(
        r#"
        SELECT * FROM cards
        WHERE customer_id = $1 AND tenant_id = $2
        ORDER BY is_default DESC, created_at DESC
        "#,
    )
    .bind(customer_id)
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(cards)
}

pub async fn get_card(pool: &DbPool, auth: &AuthContext, card_id: Uuid) -> Result<Card, AppError> {
    fetch_card(pool, auth.tenant_id, card_id).await
}

/// Make `card_id` the customer's only default card.
pub async fn set_default_card(
    pool: &DbPool,
    auth: &AuthContext,
    card_id: Uuid,
) -> Result<Card, AppError> {
    let mut tx = pool.begin().await?;

    let card = lock_card(&mut tx, auth.tenant_id, card_id).await?;
    let status = CardStatus::from_str(&card.status)
        .map_err(|_| AppError::InvalidState(format!("Unknown card status {}", card.status)))?;

    if !status.selectable_as_default() {
        return Err(AppError::InvalidState(format!(
            "A {status} card cannot be the default"
        )));
    }
    if card.is_default {
        return Ok(card);
    }

    let cards = customer_cards(&mut tx, card.customer_id).await?;
    apply_default_change(&mut tx, &plan_default_change(&cards, Some(card_id))).await?;
    let card = fetch_card(&mut *tx, auth.tenant_id, card_id).await?;

    audit_service::record(&mut *tx, auth, "card.default_changed", "card", Some(card_id), None).await?;

    tx.commit().await?;

    Ok(card)
}

/// Outcome of a verification attempt.
#[derive(Debug)]
pub struct VerificationResult {
    pub card: Card,
    pub authenticated: bool,
}

/// Verify a pending card through 3-D Secure.
///
/// The gateway call happens outside any database transaction; the result is
/// applied afterwards under the customer lock, provided the card is still
/// pending. Gateway errors leave the card untouched.
pub async fn verify_card(
    pool: &DbPool,
    three_ds: &ThreeDsClient,
    auth: &AuthContext,
    card_id: Uuid,
) -> Result<VerificationResult, AppError> {
    let card = fetch_card(pool, auth.tenant_id, card_id).await?;
    ensure_transition(&card, CardStatus::Verified)?;

    let outcome = three_ds
        .authenticate(&AuthenticationRequest {
            card_fingerprint: &card.fingerprint,
            card_brand: &card.brand,
            cardholder_name: &card.cardholder_name,
            message_category: "02",
            purchase_amount: 0,
        })
        .await?;

    let mut tx = pool.begin().await?;
    let card = lock_card(&mut tx, auth.tenant_id, card_id).await?;
    ensure_transition(&card, CardStatus::Verified)?;

    let result = match outcome {
        ThreeDsOutcome::Authenticated { ds_trans_id } => {
            let card = sqlx::query_as::<_, Card>(
                r#"
                UPDATE cards
                SET status = 'verified', verified_at = NOW(), failed_verifications = 0, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(card_id)
            .fetch_one(&mut *tx)
            .await?;

            audit_service::record(
                &mut *tx,
                auth,
                "card.verified",
                "card",
                Some(card_id),
                Some(serde_json::json!({ "ds_trans_id": ds_trans_id })),
            )
            .await?;

            VerificationResult { card, authenticated: true }
        }
        ThreeDsOutcome::Failed { trans_status } => {
            let card = record_failed_verification(&mut tx, auth, card, &trans_status).await?;
            VerificationResult { card, authenticated: false }
        }
    };

    tx.commit().await?;

    Ok(result)
}

async fn record_failed_verification(
    conn: &mut PgConnection,
    auth: &AuthContext,
    card: Card,
    trans_status: &str,
) -> Result<Card, AppError> {
    let failures = card.failed_verifications + 1;
    let block = failures >= MAX_FAILED_VERIFICATIONS;

    let updated = sqlx::query_as::<_, Card>(
        r#"
        UPDATE cards
        SET failed_verifications = $1,
            status = CASE WHEN $2 THEN 'blocked' ELSE status END,
            is_default = CASE WHEN $2 THEN FALSE ELSE is_default END,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(failures)
    .bind(block)
    .bind(card.id)
    .fetch_one(&mut *conn)
    .await?;

    audit_service::record(
        &mut *conn,
        auth,
        "card.verification_failed",
        "card",
        Some(card.id),
        Some(serde_json::json!({ "trans_status": trans_status, "attempt": failures })),
    )
    .await?;

    if block {
        repair_default(conn, card.customer_id).await?;

        alert_service::raise(
            &mut *conn,
            auth.tenant_id,
            NewAlert {
                alert_type: AlertType::CardBlocked,
                severity: Severity::High,
                entity_type: "card",
                entity_id: Some(card.id),
                message: format!(
                    "{} card ending {} blocked after {} failed verifications",
                    card.brand, card.last4, failures
                ),
            },
        )
        .await?;

        audit_service::record(&mut *conn, auth, "card.blocked", "card", Some(card.id), None).await?;
    }

    tracing::warn!(
        "card {} failed 3DS verification ({}), attempt {}",
        card.id,
        trans_status,
        failures
    );

    Ok(updated)
}

/// `verified -> active`
pub async fn activate_card(
    pool: &DbPool,
    sms: &SmsClient,
    auth: &AuthContext,
    card_id: Uuid,
) -> Result<Card, AppError> {
    let card = simple_transition(
        pool,
        auth,
        card_id,
        CardStatus::Verified,
        CardStatus::Active,
        None,
    )
    .await?;
    notify_customer(pool, sms, auth, &card, "is now active").await;
    Ok(card)
}

/// `active -> suspended`
pub async fn suspend_card(
    pool: &DbPool,
    sms: &SmsClient,
    auth: &AuthContext,
    card_id: Uuid,
    reason: String,
) -> Result<Card, AppError> {
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::invalid("A suspension reason is required"));
    }

    let card = simple_transition(
        pool,
        auth,
        card_id,
        CardStatus::Active,
        CardStatus::Suspended,
        Some(reason),
    )
    .await?;
    notify_customer(pool, sms, auth, &card, "has been suspended").await;
    Ok(card)
}

/// `suspended -> active`
pub async fn reactivate_card(
    pool: &DbPool,
    auth: &AuthContext,
    card_id: Uuid,
) -> Result<Card, AppError> {
    simple_transition(
        pool,
        auth,
        card_id,
        CardStatus::Suspended,
        CardStatus::Active,
        None,
    )
    .await
}

/// Any state except `removed` -> `removed`. A removed default hands the
/// flag to the newest remaining eligible card.
pub async fn remove_card(
    pool: &DbPool,
    auth: &AuthContext,
    card_id: Uuid,
) -> Result<Card, AppError> {
    let mut tx = pool.begin().await?;

    let card = lock_card(&mut tx, auth.tenant_id, card_id).await?;
    ensure_transition(&card, CardStatus::Removed)?;

    let removed = sqlx::query_as::<_, Card>(
        r#"
        UPDATE cards
        SET status = 'removed', is_default = FALSE, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(card_id)
    .fetch_one(&mut *tx)
    .await?;

    repair_default(&mut tx, card.customer_id).await?;

    audit_service::record(
        &mut *tx,
        auth,
        "card.removed",
        "card",
        Some(card_id),
        Some(serde_json::json!({ "was_default": card.is_default })),
    )
    .await?;

    tx.commit().await?;

    Ok(removed)
}

async fn simple_transition(
    pool: &DbPool,
    auth: &AuthContext,
    card_id: Uuid,
    from: CardStatus,
    next: CardStatus,
    suspension_reason: Option<String>,
) -> Result<Card, AppError> {
    let mut tx = pool.begin().await?;

    let card = lock_card(&mut tx, auth.tenant_id, card_id).await?;
    ensure_transition_from(&card, from, next)?;

    let updated = sqlx::query_as::<_, Card>(
        r#"
        UPDATE cards
        SET status = $1, suspension_reason = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(next.as_ref())
    .bind(&suspension_reason)
    .bind(card_id)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        &format!("card.{next}"),
        "card",
        Some(card_id),
        Some(serde_json::json!({ "from": from, "reason": suspension_reason })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!("card {} moved from {} to {}", card_id, from, next);

    Ok(updated)
}

/// Best effort; a failed lookup or send never undoes the card change.
async fn notify_customer(pool: &DbPool, sms: &SmsClient, auth: &AuthContext, card: &Card, what: &str) {
    match customer_service::fetch_customer(pool, auth.tenant_id, card.customer_id).await {
        Ok(customer) => {
            let body = format!("Your {} card ending {} {}.", card.brand, card.last4, what);
            sms.notify(&customer.phone, &body).await;
        }
        Err(e) => tracing::error!("could not load customer for card {}: {}", card.id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn request(number: &str, month: u32, year: i32, cvv: &str) -> AddCardRequest {
        AddCardRequest {
            customer_id: Uuid::new_v4(),
            card_number: number.to_string(),
            expiry_month: month,
            expiry_year: year,
            cvv: cvv.to_string(),
            cardholder_name: "ADA LOVELACE".to_string(),
        }
    }

    #[test]
    fn normalization_strips_separators() {
        assert_eq!(
            normalize_card_number("4111 1111-1111 1111").unwrap(),
            "4111111111111111"
        );
        assert!(normalize_card_number("4111 1111 1111 111a").is_err());
        assert!(normalize_card_number("41111111111").is_err());
        assert!(normalize_card_number("41111111111111111111").is_err());
    }

    #[test]
    fn brands_are_detected_by_prefix_and_length() {
        let cases = [
            ("4111111111111111", CardBrand::Visa),
            ("4222222222222", CardBrand::Visa),
            ("5555555555554444", CardBrand::Mastercard),
            ("2223003122003222", CardBrand::Mastercard),
            ("378282246310005", CardBrand::Amex),
            ("6011111111111117", CardBrand::Discover),
            ("6445644564456445", CardBrand::Discover),
            ("6221260000000000", CardBrand::Discover),
            ("3530111333300000", CardBrand::Jcb),
            ("36227206271667", CardBrand::Diners),
            ("30569309025904", CardBrand::Diners),
            ("6200000000000005", CardBrand::UnionPay),
        ];
        for (number, brand) in cases {
            assert_eq!(detect_brand(number), Some(brand), "{number}");
        }
    }

    #[test]
    fn wrong_length_or_prefix_has_no_brand() {
        assert_eq!(detect_brand("41111111111111"), None);
        assert_eq!(detect_brand("555555555555444"), None);
        assert_eq!(detect_brand("9111111111111111"), None);
        assert_eq!(detect_brand("1234567890123"), None);
    }

    #[test]
    fn expiry_is_valid_through_end_of_month() {
        assert_eq!(validate_expiry(6, 2025, today()).unwrap(), (6, 2025));
        assert_eq!(validate_expiry(6, 25, today()).unwrap(), (6, 2025));
        assert!(validate_expiry(5, 2025, today()).is_err());
        assert!(validate_expiry(12, 24, today()).is_err());
    }

    #[test]
    fn expiry_bounds() {
        assert!(validate_expiry(0, 2026, today()).is_err());
        assert!(validate_expiry(13, 2026, today()).is_err());
        assert!(validate_expiry(1, 2045, today()).is_ok());
        assert!(validate_expiry(1, 2046, today()).is_err());
        assert!(validate_expiry(1, 202, today()).is_err());
    }

    #[test]
    fn cvv_length_depends_on_brand() {
        assert!(validate_cvv("123", CardBrand::Visa).is_ok());
        assert!(validate_cvv("1234", CardBrand::Visa).is_err());
        assert!(validate_cvv("1234", CardBrand::Amex).is_ok());
        assert!(validate_cvv("123", CardBrand::Amex).is_err());
        assert!(validate_cvv("12a", CardBrand::Mastercard).is_err());
    }

    #[test]
    fn full_validation_keeps_only_last_four() {
        let validated =
            validate_card(&request("4111 1111 1111 1111", 12, 2027, "123"), today()).unwrap();
        assert_eq!(validated.brand, CardBrand::Visa);
        assert_eq!(validated.last4, "1111");
        assert_eq!(validated.expiry_year, 2027);
    }

    #[test]
    fn luhn_failure_is_reported_before_brand() {
        let err = validate_card(&request("4111111111111112", 12, 2027, "123"), today()).unwrap_err();
        assert_eq!(err.to_string(), "Card number failed checksum validation");
    }

    #[test]
    fn unknown_brand_is_rejected() {
        // Luhn-valid, but no network uses the 9 prefix
        let err = validate_card(&request("9000000000000001", 12, 2027, "123"), today()).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported card brand");
    }

    #[test]
    fn fingerprint_is_salted_per_tenant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let number = "4111111111111111";
        assert_eq!(fingerprint(a, number), fingerprint(a, number));
        assert_ne!(fingerprint(a, number), fingerprint(b, number));
        assert_eq!(fingerprint(a, number).len(), 64);
    }

    fn card_with_status(status: &str) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            brand: "visa".to_string(),
            last4: "1111".to_string(),
            fingerprint: String::new(),
            cardholder_name: "ADA".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            status: status.to_string(),
            is_default: false,
            failed_verifications: 0,
            suspension_reason: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transitions_are_checked_against_stored_status() {
        assert_eq!(
            ensure_transition(&card_with_status("verified"), CardStatus::Active).unwrap(),
            CardStatus::Verified
        );
        assert!(matches!(
            ensure_transition(&card_with_status("pending_verification"), CardStatus::Active),
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            ensure_transition(&card_with_status("removed"), CardStatus::Removed),
            Err(AppError::InvalidState(_))
        ));
        assert!(ensure_transition(&card_with_status("bogus"), CardStatus::Active).is_err());
    }

    #[test]
    fn activation_only_from_verified() {
        let activate = |status| {
            ensure_transition_from(&card_with_status(status), CardStatus::Verified, CardStatus::Active)
        };
        assert!(activate("verified").is_ok());
        assert!(matches!(activate("suspended"), Err(AppError::InvalidState(_))));
        assert!(matches!(activate("pending_verification"), Err(AppError::InvalidState(_))));
    }

    #[test]
    fn reactivation_only_from_suspended() {
        let reactivate = |status| {
            ensure_transition_from(&card_with_status(status), CardStatus::Suspended, CardStatus::Active)
        };
        assert!(reactivate("suspended").is_ok());
        assert!(matches!(reactivate("verified"), Err(AppError::InvalidState(_))));
        assert!(matches!(reactivate("blocked"), Err(AppError::InvalidState(_))));
    }

    fn card_added(status: &str, minutes_ago: i64, is_default: bool) -> Card {
        let mut card = card_with_status(status);
        card.created_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
        card.is_default = is_default;
        card
    }

    /// Apply a change the way the SQL does and return the default holders.
    fn defaults_after(mut cards: Vec<Card>, change: &DefaultChange) -> Vec<Uuid> {
        for card in &mut cards {
            if change.clear.contains(&card.id) {
                card.is_default = false;
            }
            if change.set == Some(card.id) {
                card.is_default = true;
            }
        }
        cards.iter().filter(|c| c.is_default).map(|c| c.id).collect()
    }

    fn repaired(cards: Vec<Card>) -> Vec<Uuid> {
        let change = plan_default_change(&cards, default_holder(&cards));
        defaults_after(cards, &change)
    }

    #[test]
    fn first_card_becomes_default() {
        let first = card_added("pending_verification", 0, false);
        let id = first.id;
        assert_eq!(repaired(vec![first]), vec![id]);
    }

    #[test]
    fn later_cards_leave_the_default_alone() {
        let existing = card_added("active", 60, true);
        let existing_id = existing.id;
        let cards = vec![existing, card_added("pending_verification", 0, false)];

        assert_eq!(default_holder(&cards), Some(existing_id));
        assert_eq!(
            plan_default_change(&cards, default_holder(&cards)),
            DefaultChange::default()
        );
    }

    #[test]
    fn blocked_or_removed_default_hands_over_to_newest_eligible() {
        let older = card_added("active", 120, false);
        let newer = card_added("verified", 60, false);
        let newer_id = newer.id;
        let cards = vec![
            older,
            newer,
            card_added("blocked", 90, true),
            card_added("removed", 0, false),
        ];

        assert_eq!(repaired(cards), vec![newer_id]);
    }

    #[test]
    fn no_eligible_card_means_no_default() {
        let cards = vec![card_added("blocked", 10, true), card_added("removed", 5, false)];
        assert_eq!(default_holder(&cards), None);
        assert!(repaired(cards).is_empty());
    }

    #[test]
    fn choosing_a_default_swaps_the_flag() {
        let current = card_added("active", 60, true);
        let chosen = card_added("suspended", 30, false);
        let (current_id, chosen_id) = (current.id, chosen.id);
        let cards = vec![current, chosen];

        let change = plan_default_change(&cards, Some(chosen_id));
        assert_eq!(change.clear, vec![current_id]);
        assert_eq!(change.set, Some(chosen_id));
        assert_eq!(defaults_after(cards.clone(), &change), vec![chosen_id]);

        assert_eq!(
            plan_default_change(&cards, Some(current_id)),
            DefaultChange::default()
        );
    }

    #[test]
    fn duplicate_defaults_collapse_to_one() {
        let cards = vec![card_added("active", 60, true), card_added("verified", 30, true)];
        assert_eq!(repaired(cards).len(), 1);
    }
}
