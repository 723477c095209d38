//! Cent amounts and their decimal rendering.
//!
//! Balances are stored as `i64` cents to avoid floating-point errors. DTOs
//! expose them twice: the raw cents and a two-decimal string.

use rust_decimal::Decimal;

/// Render cents as a decimal string with two fractional digits.
pub fn cents_to_string(cents: i64) -> String {
    Decimal::new(cents, 2).to_string()
}

/// Uppercase ISO 4217 style code: exactly three ASCII letters.
pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_render_with_two_decimals() {
        assert_eq!(cents_to_string(12345), "123.45");
        assert_eq!(cents_to_string(100), "1.00");
        assert_eq!(cents_to_string(0), "0.00");
        assert_eq!(cents_to_string(-5), "-0.05");
    }

    #[test]
    fn currency_codes() {
        assert!(is_valid_currency("USD"));
        assert!(!is_valid_currency("usd"));
        assert!(!is_valid_currency("US"));
        assert!(!is_valid_currency("EURO"));
    }
}
