//! Luhn (mod 10) checksum, used for card numbers and generated account numbers.

/// Sum of the Luhn-weighted digits, counting from the rightmost digit as position 0.
/// `None` if any character is not an ASCII digit.
fn weighted_sum(digits: &str, double_even_positions: bool) -> Option<u32> {
    let mut sum = 0;
    for (position, c) in digits.chars().rev().enumerate() {
        let mut digit = c.to_digit(10)?;
        let double = (position % 2 == 1) != double_even_positions;
        if double {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    Some(sum)
}

/// True if `number` is all digits and passes the Luhn checksum.
pub fn is_valid(number: &str) -> bool {
    !number.is_empty() && weighted_sum(number, false).is_some_and(|sum| sum % 10 == 0)
}

/// Digit that makes `payload` followed by it Luhn-valid.
pub fn check_digit(payload: &str) -> Option<char> {
    let sum = weighted_sum(payload, true)?;
    char::from_digit((10 - sum % 10) % 10, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_valid_numbers() {
        for number in [
            "4111111111111111",
            "5555555555554444",
            "378282246310005",
            "6011111111111117",
            "79927398713",
        ] {
            assert!(is_valid(number), "{number}");
        }
    }

    #[test]
    fn single_digit_change_is_caught() {
        assert!(!is_valid("4111111111111112"));
        assert!(!is_valid("79927398710"));
    }

    #[test]
    fn non_digits_and_empty_input_are_invalid() {
        assert!(!is_valid(""));
        assert!(!is_valid("4111-1111-1111-1111"));
    }

    #[test]
    fn check_digit_completes_a_valid_number() {
        assert_eq!(check_digit("7992739871"), Some('3'));
        assert_eq!(check_digit("411111111111111"), Some('1'));

        let payload = "482019375";
        let full = format!("{payload}{}", check_digit(payload).unwrap());
        assert!(is_valid(&full));
    }
}
