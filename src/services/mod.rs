//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and tenant scoping.
//! Every function returns `Result<_, AppError>`; the envelope is built by
//! the handlers.

pub mod account_service;
pub mod alert_service;
pub mod audit_service;
pub mod branch_service;
pub mod card_service;
pub mod credit_service;
pub mod customer_service;
pub mod dashboard_service;
pub mod reconciliation_service;
pub mod statement_service;
pub mod transaction_service;
pub mod workflow_service;

/// LIMIT/OFFSET pair after clamping client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// `limit` falls back to `default` and is clamped to `1..=max`;
    /// negative offsets become 0.
    pub fn new(limit: Option<i64>, offset: Option<i64>, default: i64, max: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default).clamp(1, max),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_limit_and_offset() {
        assert_eq!(Page::new(None, None, 50, 500), Page { limit: 50, offset: 0 });
        assert_eq!(Page::new(Some(0), Some(-3), 50, 500), Page { limit: 1, offset: 0 });
        assert_eq!(Page::new(Some(10_000), Some(20), 50, 500), Page { limit: 500, offset: 20 });
    }
}
