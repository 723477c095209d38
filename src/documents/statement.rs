//! Statement layout: figures, header block and one line per transaction.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    documents::pdf,
    models::{money, transaction::Transaction},
};

/// Balances and totals for one statement period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementFigures {
    pub opening_balance_cents: i64,
    pub closing_balance_cents: i64,
    pub total_credits_cents: i64,
    pub total_debits_cents: i64,
    pub transaction_count: usize,
}

/// Derive the period figures from the current balance.
///
/// `net_since_start` is the signed movement of every completed transaction
/// from the start of the period until now; `period` holds the completed
/// transactions inside the period.
pub fn compute_figures(
    account_id: Uuid,
    current_balance_cents: i64,
    net_since_start: i64,
    period: &[Transaction],
) -> StatementFigures {
    let opening = current_balance_cents - net_since_start;

    let (credits, debits) = period.iter().fold((0i64, 0i64), |(credits, debits), t| {
        let delta = t.signed_amount_for(account_id);
        if delta >= 0 {
            (credits + delta, debits)
        } else {
            (credits, debits - delta)
        }
    });

    StatementFigures {
        opening_balance_cents: opening,
        closing_balance_cents: opening + credits - debits,
        total_credits_cents: credits,
        total_debits_cents: debits,
        transaction_count: period.len(),
    }
}

/// What goes on the document besides the transactions.
#[derive(Debug, Clone)]
pub struct StatementHeader<'a> {
    pub statement_id: Uuid,
    pub account_id: Uuid,
    pub account_number: &'a str,
    pub account_name: &'a str,
    pub currency: &'a str,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

const DESCRIPTION_WIDTH: usize = 32;

fn column_header() -> Vec<String> {
    vec![
        format!(
            "{:<10}  {:<width$}  {:>14}  {:>14}",
            "Date",
            "Description",
            "Amount",
            "Balance",
            width = DESCRIPTION_WIDTH
        ),
        "-".repeat(10 + 2 + DESCRIPTION_WIDTH + 2 + 14 + 2 + 14),
    ]
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width - 3).collect();
        cut.push_str("...");
        cut
    }
}

/// Transaction lines with a running balance.
pub fn transaction_lines(account_id: Uuid, opening_balance_cents: i64, period: &[Transaction]) -> Vec<String> {
    let mut balance = opening_balance_cents;

    period
        .iter()
        .map(|t| {
            let delta = t.signed_amount_for(account_id);
            balance += delta;
            let description = t
                .description
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(&t.transaction_type);
            format!(
                "{:<10}  {:<width$}  {:>14}  {:>14}",
                t.created_at.date_naive(),
                truncate(description, DESCRIPTION_WIDTH),
                money::cents_to_string(delta),
                money::cents_to_string(balance),
                width = DESCRIPTION_WIDTH
            )
        })
        .collect()
}

fn summary_lines(header: &StatementHeader<'_>, figures: &StatementFigures) -> Vec<String> {
    vec![
        "ACCOUNT STATEMENT".to_string(),
        String::new(),
        format!("Account:   {} ({})", header.account_number, header.account_name),
        format!("Currency:  {}", header.currency),
        format!("Period:    {} to {}", header.period_start, header.period_end),
        format!("Statement: {}", header.statement_id),
        String::new(),
        format!("Opening balance: {:>14}", money::cents_to_string(figures.opening_balance_cents)),
        format!("Total credits:   {:>14}", money::cents_to_string(figures.total_credits_cents)),
        format!("Total debits:    {:>14}", money::cents_to_string(figures.total_debits_cents)),
        format!("Closing balance: {:>14}", money::cents_to_string(figures.closing_balance_cents)),
        format!("Transactions:    {:>14}", figures.transaction_count),
        String::new(),
    ]
}

/// Render the statement as a paginated PDF. The summary block opens the
/// first page; the column header repeats on every page.
pub fn render(header: &StatementHeader<'_>, figures: &StatementFigures, period: &[Transaction]) -> Vec<u8> {
    let mut body = summary_lines(header, figures);

    let rows = transaction_lines(header.account_id, figures.opening_balance_cents, period);
    if rows.is_empty() {
        body.push("No transactions in this period.".to_string());
    } else {
        body.extend(rows);
    }

    pdf::render(&pdf::paginate(&column_header(), &body, pdf::LINES_PER_PAGE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn txn(from: Option<Uuid>, to: Option<Uuid>, amount_cents: i64, description: Option<&str>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            idempotency_key: None,
            transaction_type: if from.is_some() && to.is_some() {
                "transfer"
            } else if to.is_some() {
                "credit"
            } else {
                "debit"
            }
            .to_string(),
            from_account_id: from,
            to_account_id: to,
            amount_cents,
            currency: "USD".to_string(),
            description: description.map(str::to_string),
            status: "completed".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            metadata: None,
        }
    }

    #[test]
    fn figures_walk_back_from_current_balance() {
        let account = Uuid::new_v4();
        let other = Uuid::new_v4();
        let period = vec![
            txn(None, Some(account), 10_000, Some("Salary")),
            txn(Some(account), None, 2_500, None),
            txn(Some(account), Some(other), 1_000, Some("Rent")),
        ];

        // Period net is +6_500; another +3_000 arrived after the period ended
        let figures = compute_figures(account, 20_000, 9_500, &period);

        assert_eq!(figures.opening_balance_cents, 10_500);
        assert_eq!(figures.total_credits_cents, 10_000);
        assert_eq!(figures.total_debits_cents, 3_500);
        assert_eq!(figures.closing_balance_cents, 17_000);
        assert_eq!(figures.transaction_count, 3);
    }

    #[test]
    fn running_balance_and_descriptions() {
        let account = Uuid::new_v4();
        let period = vec![
            txn(None, Some(account), 10_000, Some("Salary")),
            txn(Some(account), None, 2_500, None),
        ];
        let lines = transaction_lines(account, 500, &period);

        assert!(lines[0].starts_with("2025-03-10  Salary"));
        assert!(lines[0].ends_with("105.00"));
        assert!(lines[1].contains("debit"));
        assert!(lines[1].contains("-25.00"));
        assert!(lines[1].ends_with("80.00"));
    }

    #[test]
    fn long_descriptions_are_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer description", 10), "a much ...");
    }

    #[test]
    fn rendered_statement_is_a_pdf_with_the_figures() {
        let account = Uuid::new_v4();
        let period: Vec<Transaction> = (0..150)
            .map(|_| txn(None, Some(account), 100, Some("Deposit")))
            .collect();
        let figures = compute_figures(account, 15_000, 15_000, &period);
        let header = StatementHeader {
            statement_id: Uuid::new_v4(),
            account_id: account,
            account_number: "4820193755",
            account_name: "Main",
            currency: "USD",
            period_start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        };

        let pdf = String::from_utf8(render(&header, &figures, &period)).unwrap();
        assert!(pdf.starts_with("%PDF-1.4"));
        assert!(pdf.contains("(Account:   4820193755 \\(Main\\)) Tj T*"));
        assert!(pdf.contains("Closing balance:         150.00"));
        // 13 summary lines + 150 rows, 58 body lines per page
        assert!(pdf.contains("/Count 3"));
    }
}
