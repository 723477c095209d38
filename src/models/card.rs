//! Payment card models.
//!
//! Full card numbers never reach the database: a card is stored as its
//! brand, last four digits and a SHA-256 fingerprint of the normalized number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Card {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub brand: String,
    pub last4: String,
    pub fingerprint: String,
    pub cardholder_name: String,
    pub expiry_month: i16,
    pub expiry_year: i16,
    pub status: String,
    pub is_default: bool,
    pub failed_verifications: i32,
    pub suspension_reason: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Jcb,
    Diners,
    UnionPay,
}

impl CardBrand {
    pub fn cvv_length(self) -> usize {
        match self {
            CardBrand::Amex => 4,
            _ => 3,
        }
    }
}

/// Card lifecycle.
///
/// ```text
/// pending_verification --verify--> verified --activate--> active <--> suspended
///          |
///          +--3rd failed verify--> blocked
/// every state except removed --remove--> removed
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardStatus {
    PendingVerification,
    Verified,
    Active,
    Suspended,
    Blocked,
    Removed,
}

impl CardStatus {
    pub fn can_transition_to(self, next: CardStatus) -> bool {
        use CardStatus::*;
        match (self, next) {
            (Removed, _) => false,
            (_, Removed) => true,
            (PendingVerification, Verified) | (PendingVerification, Blocked) => true,
            (Verified, Active) => true,
            (Active, Suspended) => true,
            (Suspended, Active) => true,
            _ => false,
        }
    }

    /// Cards that keep (or may inherit) the customer's default flag.
    pub fn holds_default(self) -> bool {
        !matches!(self, CardStatus::Removed | CardStatus::Blocked)
    }

    /// Cards a customer may explicitly choose as default.
    pub fn selectable_as_default(self) -> bool {
        matches!(
            self,
            CardStatus::Verified | CardStatus::Active | CardStatus::Suspended
        )
    }
}

/// Request body for adding a card.
///
/// # JSON Example
///
/// ```json
/// {
///   "customer_id": "550e8400-e29b-41d4-a716-446655440000",
///   "card_number": "4111 1111 1111 1111",
///   "expiry_month": 12,
///   "expiry_year": 2030,
///   "cvv": "123",
///   "cardholder_name": "ADA LOVELACE"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    pub customer_id: Uuid,
    pub card_number: String,
    pub expiry_month: u32,
    /// Two or four digits
    pub expiry_year: i32,
    pub cvv: String,
    pub cardholder_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SuspendCardRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CardListQuery {
    pub customer_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub brand: String,
    pub masked_number: String,
    pub cardholder_name: String,
    pub expiry: String,
    pub status: String,
    pub is_default: bool,
    pub suspension_reason: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Card> for CardResponse {
    fn from(card: Card) -> Self {
        Self {
            id: card.id,
            customer_id: card.customer_id,
            masked_number: format!("**** **** **** {}", card.last4),
            brand: card.brand,
            cardholder_name: card.cardholder_name,
            expiry: format!("{:02}/{:02}", card.expiry_month, card.expiry_year % 100),
            status: card.status,
            is_default: card.is_default,
            suspension_reason: card.suspension_reason,
            verified_at: card.verified_at,
            created_at: card.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lifecycle_transitions() {
        use CardStatus::*;
        assert!(PendingVerification.can_transition_to(Verified));
        assert!(PendingVerification.can_transition_to(Blocked));
        assert!(Verified.can_transition_to(Active));
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));

        assert!(!PendingVerification.can_transition_to(Active));
        assert!(!Verified.can_transition_to(Suspended));
        assert!(!Blocked.can_transition_to(Active));
        assert!(!Active.can_transition_to(Verified));
    }

    #[test]
    fn removal_is_terminal_and_always_reachable() {
        use CardStatus::*;
        for status in [PendingVerification, Verified, Active, Suspended, Blocked] {
            assert!(status.can_transition_to(Removed), "{status} -> removed");
        }
        for status in [PendingVerification, Verified, Active, Suspended, Blocked, Removed] {
            assert!(!Removed.can_transition_to(status));
        }
    }

    #[test]
    fn default_eligibility() {
        assert!(CardStatus::PendingVerification.holds_default());
        assert!(!CardStatus::Blocked.holds_default());
        assert!(!CardStatus::Removed.holds_default());
        assert!(!CardStatus::PendingVerification.selectable_as_default());
        assert!(CardStatus::Suspended.selectable_as_default());
    }

    #[test]
    fn status_strings_match_database_values() {
        assert_eq!(CardStatus::PendingVerification.as_ref(), "pending_verification");
        assert_eq!(
            CardStatus::from_str("suspended").unwrap(),
            CardStatus::Suspended
        );
        assert_eq!(CardBrand::UnionPay.as_ref(), "union_pay");
    }

    #[test]
    fn response_masks_number() {
        let now = Utc::now();
        let card = Card {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            brand: "visa".to_string(),
            last4: "1111".to_string(),
            fingerprint: "ab".repeat(32),
            cardholder_name: "ADA LOVELACE".to_string(),
            expiry_month: 3,
            expiry_year: 2031,
            status: "active".to_string(),
            is_default: true,
            failed_verifications: 0,
            suspension_reason: None,
            verified_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        let response = CardResponse::from(card);
        assert_eq!(response.masked_number, "**** **** **** 1111");
        assert_eq!(response.expiry, "03/31");
    }
}
