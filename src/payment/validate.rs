//! Structural checks on card details submitted from outside.
//!
//! These never look at balances or validity flags; a card that passes here
//! can still be declined by a charge.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{CardBrand, is_before_month};

/// Card details as submitted by a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
}

/// First structural problem found in [`CardDetails`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CardShapeError {
    #[error("card number must be 13 to 19 digits")]
    InvalidNumber,

    #[error("cardholder name is required")]
    MissingHolder,

    #[error("expiry month {0} is not between 1 and 12")]
    InvalidExpiryMonth(u32),

    #[error("card expired in {month:02}/{year}")]
    Expired { month: u32, year: i32 },

    #[error("security code must be {expected} digits")]
    InvalidCvv { expected: usize },
}

/// Check the shape of `details` as of `today`, returning the detected brand.
///
/// Checks run in order: number, holder, expiry month, expiry date, security code.
pub fn validate_card_shape(
    details: &CardDetails,
    today: NaiveDate,
) -> Result<CardBrand, CardShapeError> {
    let digits: String = details.number.chars().filter(|c| *c != ' ').collect();
    if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardShapeError::InvalidNumber);
    }

    if details.holder.trim().is_empty() {
        return Err(CardShapeError::MissingHolder);
    }

    if !(1..=12).contains(&details.expiry_month) {
        return Err(CardShapeError::InvalidExpiryMonth(details.expiry_month));
    }

    if is_before_month(details.expiry_year, details.expiry_month, today) {
        return Err(CardShapeError::Expired {
            month: details.expiry_month,
            year: details.expiry_year,
        });
    }

    let brand = CardBrand::from_number(&digits);
    let expected = brand.cvv_len();
    if details.cvv.len() != expected || !details.cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardShapeError::InvalidCvv { expected });
    }

    Ok(brand)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn details() -> CardDetails {
        CardDetails {
            number: "4242 4242 4242 4242".into(),
            holder: "Ada Lovelace".into(),
            expiry_month: 12,
            expiry_year: 2030,
            cvv: "123".into(),
        }
    }

    #[test]
    fn valid_card_returns_brand() {
        assert_eq!(validate_card_shape(&details(), today()), Ok(CardBrand::Visa));
    }

    #[test]
    fn amex_needs_four_digit_cvv() {
        let mut amex = CardDetails {
            number: "378282246310005".into(),
            ..details()
        };
        assert_eq!(
            validate_card_shape(&amex, today()),
            Err(CardShapeError::InvalidCvv { expected: 4 })
        );

        amex.cvv = "1234".into();
        assert_eq!(validate_card_shape(&amex, today()), Ok(CardBrand::Amex));
    }

    #[test]
    fn number_must_be_digits_of_valid_length() {
        for number in ["4242", "4242-4242-4242-4242", "42424242424242424242", "abcdabcdabcdabcd"] {
            let card = CardDetails {
                number: number.into(),
                ..details()
            };
            assert_eq!(
                validate_card_shape(&card, today()),
                Err(CardShapeError::InvalidNumber),
                "{number}"
            );
        }
    }

    #[test]
    fn holder_must_not_be_blank() {
        let card = CardDetails {
            holder: "   ".into(),
            ..details()
        };
        assert_eq!(
            validate_card_shape(&card, today()),
            Err(CardShapeError::MissingHolder)
        );
    }

    #[test]
    fn month_out_of_range() {
        for month in [0, 13] {
            let card = CardDetails {
                expiry_month: month,
                ..details()
            };
            assert_eq!(
                validate_card_shape(&card, today()),
                Err(CardShapeError::InvalidExpiryMonth(month))
            );
        }
    }

    #[test]
    fn expiry_month_is_still_usable() {
        let current = CardDetails {
            expiry_month: 10,
            expiry_year: 2026,
            ..details()
        };
        assert!(validate_card_shape(&current, today()).is_ok());

        let past = CardDetails {
            expiry_month: 9,
            ..current
        };
        assert_eq!(
            validate_card_shape(&past, today()),
            Err(CardShapeError::Expired {
                month: 9,
                year: 2026
            })
        );
    }

    #[test]
    fn first_failure_wins() {
        let card = CardDetails {
            number: "12".into(),
            holder: String::new(),
            expiry_month: 0,
            expiry_year: 1999,
            cvv: "x".into(),
        };
        assert_eq!(
            validate_card_shape(&card, today()),
            Err(CardShapeError::InvalidNumber)
        );
    }
}
