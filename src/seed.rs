//! Fixed set of simulated cards covering every charge outcome.

use crate::Amount;
use crate::model::{CardId, PaymentCard};

/// Valid, well funded Visa. Charges succeed.
pub const SUCCESS_CARD: CardId = 1;
/// Rejected by the issuer. Declines with `card_declined`.
pub const DECLINED_CARD: CardId = 2;
/// Valid, 10.00 balance. Larger charges decline with `insufficient_funds`.
pub const LOW_BALANCE_CARD: CardId = 3;
/// Expired in January 2020. Declines with `expired_card`.
pub const EXPIRED_CARD: CardId = 4;
/// Valid Mastercard.
pub const MASTERCARD_CARD: CardId = 5;
/// Valid Amex with a 4 digit security code.
pub const AMEX_CARD: CardId = 6;

pub fn test_cards() -> Vec<PaymentCard> {
    vec![
        PaymentCard::new(
            SUCCESS_CARD,
            "4242424242424242",
            "Test Success",
            (12, 2030),
            "123",
            Amount::from_major(1_000),
        ),
        PaymentCard::new(
            DECLINED_CARD,
            "4000000000000002",
            "Test Declined",
            (12, 2030),
            "123",
            Amount::from_major(1_000),
        )
        .invalid(),
        PaymentCard::new(
            LOW_BALANCE_CARD,
            "4000000000009995",
            "Test Low Balance",
            (12, 2030),
            "123",
            Amount::from_major(10),
        ),
        PaymentCard::new(
            EXPIRED_CARD,
            "4000000000000069",
            "Test Expired",
            (1, 2020),
            "123",
            Amount::from_major(500),
        ),
        PaymentCard::new(
            MASTERCARD_CARD,
            "5555555555554444",
            "Test Mastercard",
            (6, 2029),
            "456",
            Amount::from_major(250),
        ),
        PaymentCard::new(
            AMEX_CARD,
            "378282246310005",
            "Test Amex",
            (3, 2031),
            "1234",
            Amount::from_major(5_000),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{CardBrand, DeclineReason};
    use crate::payment::{CardDetails, evaluate_card, validate_card_shape};

    fn card(id: CardId) -> PaymentCard {
        test_cards().into_iter().find(|c| c.id == id).unwrap()
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = test_cards().iter().map(|c| c.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn every_decline_branch_is_covered() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let amount = Amount::from_major(25);

        assert_eq!(evaluate_card(&card(SUCCESS_CARD), amount, today), None);
        assert_eq!(
            evaluate_card(&card(DECLINED_CARD), amount, today),
            Some(DeclineReason::CardDeclined)
        );
        assert_eq!(
            evaluate_card(&card(LOW_BALANCE_CARD), amount, today),
            Some(DeclineReason::InsufficientFunds)
        );
        assert_eq!(
            evaluate_card(&card(EXPIRED_CARD), amount, today),
            Some(DeclineReason::ExpiredCard)
        );
    }

    #[test]
    fn brands_match_numbers() {
        assert_eq!(card(MASTERCARD_CARD).brand, CardBrand::Mastercard);
        assert_eq!(card(AMEX_CARD).brand, CardBrand::Amex);
    }

    #[test]
    fn non_expired_cards_have_valid_shape() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        for c in test_cards().into_iter().filter(|c| c.id != EXPIRED_CARD) {
            let details = CardDetails {
                number: c.number.clone(),
                holder: c.holder.clone(),
                expiry_month: c.expiry_month,
                expiry_year: c.expiry_year,
                cvv: c.cvv.clone(),
            };
            assert_eq!(validate_card_shape(&details, today), Ok(c.brand), "card {}", c.id);
        }
    }
}
