//! Account statements: generation, listing and encrypted storage.
//!
//! # Storage
//!
//! The rendered PDF never touches the database in clear. Each statement is
//! sealed with AES-256-GCM under a key derived from the master key and the
//! statement id, and stored next to the SHA-256 checksum of the plaintext.
//! Downloads decrypt, then compare the checksum before returning anything.

use chrono::{Days, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    config::Config,
    crypto::{self, SealedDocument},
    db::DbPool,
    documents::statement::{self, StatementHeader},
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        account::Account,
        statement::{GenerateStatementRequest, Statement},
        transaction::Transaction,
    },
    services::{account_service, audit_service},
};

/// Longest period a single statement may cover, in days (inclusive).
pub const MAX_PERIOD_DAYS: i64 = 366;

pub fn validate_period(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::invalid("Period start must not be after period end"));
    }
    if end > today {
        return Err(AppError::invalid("Period end cannot be in the future"));
    }
    if (end - start).num_days() + 1 > MAX_PERIOD_DAYS {
        return Err(AppError::invalid(format!(
            "A statement covers at most {MAX_PERIOD_DAYS} days"
        )));
    }
    Ok(())
}

fn master_key(config: &Config) -> Result<[u8; 32], AppError> {
    config
        .master_key()
        .map_err(|e| AppError::Crypto(e.to_string()))
}

/// Render, encrypt and store a statement for `account_id`.
///
/// The account row is held `FOR SHARE` while the figures are computed so
/// the balance cannot move between reading it and reading the ledger.
pub async fn generate_statement(
    pool: &DbPool,
    config: &Config,
    auth: &AuthContext,
    account_id: Uuid,
    request: GenerateStatementRequest,
) -> Result<Statement, AppError> {
    validate_period(request.period_start, request.period_end, Utc::now().date_naive())?;

    let master_key = master_key(config)?;

    let mut tx = pool.begin().await?;

    let account = sqlx::query_as::<_, Account>(
        "SELECT * FROM accounts WHERE id = $1 AND tenant_id = $2 FOR SHARE",
    )
    .bind(account_id)
    .bind(auth.tenant_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Account"))?;

    let period_start = request.period_start.and_time(chrono::NaiveTime::MIN).and_utc();
    let period_end_exclusive = request
        .period_end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::invalid("Period end is out of range"))?
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();

    // Everything since the period start: the tail after the period end is
    // only needed to walk back from the current balance
    let since_start = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE tenant_id = $1
          AND (from_account_id = $2 OR to_account_id = $2)
          AND status = 'completed'
          AND created_at >= $3
        ORDER BY created_at, id
        "#,
    )
    .bind(auth.tenant_id)
    .bind(account_id)
    .bind(period_start)
    .fetch_all(&mut *tx)
    .await?;

    let net_since_start: i64 = since_start
        .iter()
        .map(|t| t.signed_amount_for(account_id))
        .sum();
    let period: Vec<Transaction> = since_start
        .into_iter()
        .filter(|t| t.created_at < period_end_exclusive)
        .collect();

    let figures = statement::compute_figures(account_id, account.balance_cents, net_since_start, &period);

    let statement_id = Uuid::new_v4();
    let pdf = statement::render(
        &StatementHeader {
            statement_id,
            account_id,
            account_number: &account.account_number,
            account_name: &account.account_name,
            currency: &account.currency,
            period_start: request.period_start,
            period_end: request.period_end,
        },
        &figures,
        &period,
    );

    let checksum = crypto::checksum(&pdf);
    let key = crypto::derive_document_key(&master_key, statement_id)?;
    let sealed = crypto::seal(&key, statement_id, &pdf)?;

    let stored = sqlx::query_as::<_, Statement>(
        r#"
        INSERT INTO statements (
            id, tenant_id, account_id, period_start, period_end,
            opening_balance_cents, closing_balance_cents, total_credits_cents,
            total_debits_cents, transaction_count, checksum, nonce, ciphertext
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(statement_id)
    .bind(auth.tenant_id)
    .bind(account_id)
    .bind(request.period_start)
    .bind(request.period_end)
    .bind(figures.opening_balance_cents)
    .bind(figures.closing_balance_cents)
    .bind(figures.total_credits_cents)
    .bind(figures.total_debits_cents)
    .bind(figures.transaction_count as i32)
    .bind(&checksum)
    .bind(&sealed.nonce)
    .bind(&sealed.ciphertext)
    .fetch_one(&mut *tx)
    .await?;

    audit_service::record(
        &mut *tx,
        auth,
        "statement.generated",
        "statement",
        Some(statement_id),
        Some(serde_json::json!({
            "account_id": account_id,
            "period_start": request.period_start,
            "period_end": request.period_end,
            "checksum": checksum,
        })),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        "statement {} generated for account {} ({} to {}, {} bytes)",
        statement_id,
        account.account_number,
        request.period_start,
        request.period_end,
        pdf.len()
    );

    Ok(stored)
}

/// Newest period first.
pub async fn list_statements(
    pool: &DbPool,
    auth: &AuthContext,
    account_id: Uuid,
) -> Result<Vec<Statement>, AppError> {
    account_service::fetch_account(pool, auth.tenant_id, account_id).await?;

    let statements = sqlx::query_as::<_, Statement>(
        r#"
        SELECT * FROM statements
        WHERE account_id = $1 AND tenant_id = $2
        ORDER BY period_end DESC, created_at DESC
        "#,
    )
    .bind(account_id)
    .bind(auth.tenant_id)
    .fetch_all(pool)
    .await?;

    Ok(statements)
}

pub async fn get_statement(
    pool: &DbPool,
    auth: &AuthContext,
    statement_id: Uuid,
) -> Result<Statement, AppError> {
    sqlx::query_as::<_, Statement>("SELECT * FROM statements WHERE id = $1 AND tenant_id = $2")
        .bind(statement_id)
        .bind(auth.tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Statement"))
}

/// Decrypt a stored statement and check it against its checksum.
pub fn decrypt_statement(master_key: &[u8; 32], statement: &Statement) -> Result<Vec<u8>, AppError> {
    let key = crypto::derive_document_key(master_key, statement.id)?;
    let pdf = crypto::open(
        &key,
        statement.id,
        &SealedDocument {
            nonce: statement.nonce.clone(),
            ciphertext: statement.ciphertext.clone(),
        },
    )?;
    crypto::verify_checksum(&pdf, &statement.checksum)?;
    Ok(pdf)
}

/// The statement PDF in clear, plus its metadata.
pub async fn download_statement(
    pool: &DbPool,
    config: &Config,
    auth: &AuthContext,
    statement_id: Uuid,
) -> Result<(Statement, Vec<u8>), AppError> {
    let statement = get_statement(pool, auth, statement_id).await?;

    let pdf = decrypt_statement(&master_key(config)?, &statement).inspect_err(|e| {
        tracing::error!("statement {} could not be opened: {}", statement_id, e);
    })?;

    audit_service::record(pool, auth, "statement.downloaded", "statement", Some(statement_id), None)
        .await?;

    Ok((statement, pdf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_rules() {
        let today = date(2025, 6, 15);
        assert!(validate_period(date(2025, 5, 1), date(2025, 5, 31), today).is_ok());
        assert!(validate_period(date(2025, 6, 15), date(2025, 6, 15), today).is_ok());
        assert!(validate_period(date(2025, 5, 31), date(2025, 5, 1), today).is_err());
        assert!(validate_period(date(2025, 6, 1), date(2025, 6, 16), today).is_err());
    }

    #[test]
    fn period_length_is_inclusive() {
        let today = date(2025, 6, 15);
        // 2024 is a leap year: 366 days from Jan 1 to Dec 31
        assert!(validate_period(date(2024, 1, 1), date(2024, 12, 31), today).is_ok());
        assert!(validate_period(date(2024, 1, 1), date(2025, 1, 1), today).is_err());
    }

    fn stored_statement(master: &[u8; 32], pdf: &[u8]) -> Statement {
        let id = Uuid::new_v4();
        let key = crypto::derive_document_key(master, id).unwrap();
        let sealed = crypto::seal(&key, id, pdf).unwrap();
        Statement {
            id,
            tenant_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            period_start: date(2025, 5, 1),
            period_end: date(2025, 5, 31),
            opening_balance_cents: 0,
            closing_balance_cents: 0,
            total_credits_cents: 0,
            total_debits_cents: 0,
            transaction_count: 0,
            checksum: crypto::checksum(pdf),
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stored_statement_decrypts() {
        let master = crate::config::test_config().master_key().unwrap();
        let statement = stored_statement(&master, b"%PDF-1.4 test");
        assert_eq!(decrypt_statement(&master, &statement).unwrap(), b"%PDF-1.4 test");
    }

    #[test]
    fn tampering_is_detected() {
        let master = [9u8; 32];

        let mut statement = stored_statement(&master, b"%PDF-1.4 test");
        let last = statement.ciphertext.len() - 1;
        statement.ciphertext[last] ^= 0xff;
        assert!(matches!(decrypt_statement(&master, &statement), Err(AppError::Crypto(_))));

        let mut statement = stored_statement(&master, b"%PDF-1.4 test");
        statement.checksum = crypto::checksum(b"something else");
        assert!(matches!(decrypt_statement(&master, &statement), Err(AppError::Crypto(_))));

        let statement = stored_statement(&master, b"%PDF-1.4 test");
        assert!(decrypt_statement(&[1u8; 32], &statement).is_err());
    }
}
