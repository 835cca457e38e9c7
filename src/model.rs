//! Core domain types shared by the booking and payment engines.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::Amount;

/// Member identifier.
pub type UserId = u32;

/// Gym class identifier.
pub type ClassId = u32;

/// Class session identifier.
pub type SessionId = u32;

/// Reservation identifier, assigned by the store.
pub type ReservationId = u64;

/// Simulated card identifier.
pub type CardId = u32;

/// Ledger entry identifier, assigned by the store.
pub type PaymentId = u64;

/// Subscription or gear order identifier.
pub type OrderId = u32;

/// One offering of a class at a fixed time slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub class: ClassId,
    pub time_slot: String,
    /// Always positive.
    pub capacity: u32,
    /// Never above `capacity`, always equal to the number of live reservations.
    pub reserved: u32,
}

impl Session {
    /// Create an empty session.
    pub fn new(id: SessionId, class: ClassId, time_slot: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            class,
            time_slot: time_slot.into(),
            capacity,
            reserved: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.reserved)
    }

    pub fn is_full(&self) -> bool {
        self.reserved >= self.capacity
    }
}

/// A member's claim on one slot of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub id: ReservationId,
    pub user: UserId,
    pub session: SessionId,
}

/// Card network, derived from the number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Unknown,
}

impl CardBrand {
    /// Detect the brand of a digits-only card number.
    pub fn from_number(digits: &str) -> Self {
        let prefix = |n: usize| digits.get(..n).and_then(|p| p.parse::<u32>().ok());

        if digits.starts_with('4') {
            CardBrand::Visa
        } else if matches!(prefix(2), Some(34 | 37)) {
            CardBrand::Amex
        } else if matches!(prefix(2), Some(51..=55)) || matches!(prefix(4), Some(2221..=2720)) {
            CardBrand::Mastercard
        } else {
            CardBrand::Unknown
        }
    }

    /// Expected security code length.
    pub fn cvv_len(self) -> usize {
        match self {
            CardBrand::Amex => 4,
            _ => 3,
        }
    }
}

/// Simulated payment instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCard {
    pub id: CardId,
    /// Digits only.
    pub number: String,
    pub holder: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    pub brand: CardBrand,
    pub is_valid: bool,
    /// Only ever mutated by a successful charge or refund.
    pub balance: Amount,
}

impl PaymentCard {
    pub fn new(
        id: CardId,
        number: impl Into<String>,
        holder: impl Into<String>,
        (expiry_month, expiry_year): (u32, i32),
        cvv: impl Into<String>,
        balance: Amount,
    ) -> Self {
        let number: String = number.into();
        Self {
            id,
            brand: CardBrand::from_number(&number),
            number,
            holder: holder.into(),
            expiry_month,
            expiry_year,
            cvv: cvv.into(),
            is_valid: true,
            balance,
        }
    }

    /// Mark the card as rejected by the issuer.
    pub fn invalid(mut self) -> Self {
        self.is_valid = false;
        self
    }

    pub fn masked_number(&self) -> String {
        let skip = self.number.chars().count().saturating_sub(4);
        let last_four: String = self.number.chars().skip(skip).collect();
        format!("**** **** **** {last_four}")
    }

    /// A card stays usable through the whole of its expiry month.
    pub fn is_expired_at(&self, today: NaiveDate) -> bool {
        is_before_month(self.expiry_year, self.expiry_month, today)
    }
}

/// True if `(year, month)` is strictly before the month containing `today`.
pub(crate) fn is_before_month(year: i32, month: u32, today: NaiveDate) -> bool {
    (year, month) < (today.year(), today.month())
}

/// Terminal state of a charge attempt or refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Succeeded,
    Declined,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Declined => "declined",
        })
    }
}

/// Why a charge was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    CardDeclined,
    InsufficientFunds,
    ExpiredCard,
    /// Injected by a [`DeclinePolicy`](crate::payment::DeclinePolicy).
    ProcessingError,
}

impl DeclineReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclineReason::CardDeclined => "card_declined",
            DeclineReason::InsufficientFunds => "insufficient_funds",
            DeclineReason::ExpiredCard => "expired_card",
            DeclineReason::ProcessingError => "processing_error",
        }
    }
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentCategory {
    #[default]
    Subscription,
    GearPurchase,
    GearRental,
    Other,
}

impl PaymentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentCategory::Subscription => "subscription",
            PaymentCategory::GearPurchase => "gear_purchase",
            PaymentCategory::GearRental => "gear_rental",
            PaymentCategory::Other => "other",
        }
    }
}

impl fmt::Display for PaymentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(PaymentCategory::Subscription),
            "gear_purchase" => Ok(PaymentCategory::GearPurchase),
            "gear_rental" => Ok(PaymentCategory::GearRental),
            "other" => Ok(PaymentCategory::Other),
            other => Err(format!("unknown payment category '{other}'")),
        }
    }
}

/// The order or subscription a payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Subscription(OrderId),
    GearOrder(OrderId),
}

/// Status the owner of a [`PaymentTarget`] should move to after a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Paid,
    PaymentFailed,
}

/// A ledger entry about to be appended. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub card: CardId,
    /// Positive for a charge, negative for a refund.
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
    pub category: PaymentCategory,
    pub description: String,
    pub failure_reason: Option<DeclineReason>,
    pub target: Option<PaymentTarget>,
    pub refund_of: Option<PaymentId>,
    /// Processing time the simulated provider reports for this entry.
    pub simulated_delay_ms: u64,
}

impl NewPayment {
    /// Build the refund entry reversing `amount` of `original`.
    pub fn refund(original: &PaymentRecord, amount: Amount) -> Self {
        Self {
            card: original.card,
            amount: -amount,
            currency: original.currency.clone(),
            status: PaymentStatus::Succeeded,
            category: original.category,
            description: format!("refund of payment {}", original.id),
            failure_reason: None,
            target: original.target,
            refund_of: Some(original.id),
            simulated_delay_ms: 0,
        }
    }

    pub fn into_record(self, id: PaymentId) -> PaymentRecord {
        PaymentRecord {
            id,
            card: self.card,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            category: self.category,
            description: self.description,
            failure_reason: self.failure_reason,
            target: self.target,
            refund_of: self.refund_of,
            simulated_delay_ms: self.simulated_delay_ms,
        }
    }
}

/// Immutable ledger entry for a charge or refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub card: CardId,
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
    pub category: PaymentCategory,
    pub description: String,
    pub failure_reason: Option<DeclineReason>,
    pub target: Option<PaymentTarget>,
    pub refund_of: Option<PaymentId>,
    pub simulated_delay_ms: u64,
}

impl PaymentRecord {
    pub fn is_refund(&self) -> bool {
        self.refund_of.is_some()
    }
}
