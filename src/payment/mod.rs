//! Simulated payment processor.
//!
//! Charges are decided from card state alone, in a fixed priority order:
//! an invalid card is declined first, then insufficient balance, then an
//! expired card. A successful charge debits the card and appends a ledger
//! entry in the same store transaction; a declined one only appends. Refunds
//! append a negative entry and credit the card back. The ledger is
//! append-only.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::Amount;
use crate::model::{
    CardBrand, CardId, DeclineReason, NewPayment, PaymentCard, PaymentCategory, PaymentId,
    PaymentRecord, PaymentStatus, PaymentTarget, TargetStatus,
};
use crate::store::Store;

mod clock;
pub use clock::{Clock, FixedClock, SystemClock};

mod error;
pub use error::PaymentError;

mod policy;
#[cfg(feature = "chaos")]
pub use policy::RandomDecline;
pub use policy::{DeclinePolicy, NeverDecline};

mod validate;
pub use validate::{CardDetails, CardShapeError, validate_card_shape};

pub const DEFAULT_CURRENCY: &str = "GBP";

/// A request to move `amount` off a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub card: CardId,
    pub amount: Amount,
    pub category: PaymentCategory,
    pub description: String,
    pub target: Option<PaymentTarget>,
}

impl ChargeRequest {
    pub fn new(card: CardId, amount: Amount) -> Self {
        Self {
            card,
            amount,
            category: PaymentCategory::default(),
            description: String::new(),
            target: None,
        }
    }

    pub fn category(mut self, category: PaymentCategory) -> Self {
        self.category = category;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn target(mut self, target: PaymentTarget) -> Self {
        self.target = Some(target);
        self
    }
}

/// Result of a charge that ran to completion. Either way a ledger entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Succeeded { payment: PaymentId },
    Declined {
        payment: PaymentId,
        reason: DeclineReason,
    },
}

impl ChargeOutcome {
    pub fn payment(&self) -> PaymentId {
        match *self {
            ChargeOutcome::Succeeded { payment } | ChargeOutcome::Declined { payment, .. } => {
                payment
            }
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ChargeOutcome::Succeeded { .. })
    }

    pub fn decline_reason(&self) -> Option<DeclineReason> {
        match *self {
            ChargeOutcome::Declined { reason, .. } => Some(reason),
            ChargeOutcome::Succeeded { .. } => None,
        }
    }

    /// Status the owner of the charged order or subscription should move to.
    pub fn target_status(&self) -> TargetStatus {
        if self.is_succeeded() {
            TargetStatus::Paid
        } else {
            TargetStatus::PaymentFailed
        }
    }
}

/// A completed refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundOutcome {
    /// The new ledger entry.
    pub payment: PaymentId,
    /// Positive amount returned to the card.
    pub amount: Amount,
}

/// Decide a charge from card state alone.
pub fn evaluate_card(card: &PaymentCard, amount: Amount, today: NaiveDate) -> Option<DeclineReason> {
    if !card.is_valid {
        Some(DeclineReason::CardDeclined)
    } else if card.balance < amount {
        Some(DeclineReason::InsufficientFunds)
    } else if card.is_expired_at(today) {
        Some(DeclineReason::ExpiredCard)
    } else {
        None
    }
}

/// The payment simulation engine.
pub struct PaymentEngine<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn DeclinePolicy>,
    currency: String,
    delay_ms: u64,
}

impl<S> Clone for PaymentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            policy: Arc::clone(&self.policy),
            currency: self.currency.clone(),
            delay_ms: self.delay_ms,
        }
    }
}

/// Public API
impl<S: Store> PaymentEngine<S> {
    /// Engine on the system clock, with no injected declines.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy: Arc::new(NeverDecline),
            currency: DEFAULT_CURRENCY.to_string(),
            delay_ms: 0,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_policy(mut self, policy: impl DeclinePolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Processing delay recorded on every new ledger entry. Nothing actually waits.
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Attempt a charge:
    /// - Ensure amount is positive and the card exists
    /// - Evaluate the card, then the decline policy
    /// - On success, debit the card and record a succeeded entry
    /// - On decline, record a declined entry with the reason
    pub fn charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, PaymentError> {
        let card = request.card;
        let amount = request.amount;
        let result = self.apply_charge(request);

        match &result {
            Ok(ChargeOutcome::Succeeded { payment }) => {
                info!(card, payment, amount = %amount, "charge succeeded");
            }
            Ok(ChargeOutcome::Declined { payment, reason }) => {
                warn!(card, payment, amount = %amount, reason = %reason, "charge declined");
            }
            Err(e) => info!(card, amount = %amount, reason = %e, "charge skipped"),
        }
        result
    }

    /// Refund `amount` of a succeeded charge, or the full original amount if `None`.
    pub fn refund(
        &self,
        payment: PaymentId,
        amount: Option<Amount>,
    ) -> Result<RefundOutcome, PaymentError> {
        let result = self.apply_refund(payment, amount);

        match &result {
            Ok(refund) => info!(
                payment,
                refund = refund.payment,
                amount = %refund.amount,
                "refund applied"
            ),
            Err(e) => info!(payment, reason = %e, "refund skipped"),
        }
        result
    }

    /// Structural check of submitted card details against today's date.
    pub fn validate_card_shape(
        &self,
        details: &CardDetails,
    ) -> Result<CardBrand, CardShapeError> {
        validate_card_shape(details, self.clock.today())
    }

    pub fn card(&self, card: CardId) -> Result<Option<PaymentCard>, PaymentError> {
        self.store.transaction(|tx| Ok(tx.card(card)?))
    }

    /// Every ledger entry for `card`, charges and refunds, oldest first.
    pub fn history(&self, card: CardId) -> Result<Vec<PaymentRecord>, PaymentError> {
        self.store.transaction(|tx| {
            if tx.card(card)?.is_none() {
                return Err(PaymentError::CardNotFound(card));
            }
            Ok(tx.payments_for_card(card)?)
        })
    }
}

/// Private API
impl<S: Store> PaymentEngine<S> {
    fn apply_charge(&self, request: ChargeRequest) -> Result<ChargeOutcome, PaymentError> {
        if !request.amount.is_positive() {
            return Err(PaymentError::InvalidAmount(request.amount));
        }
        let today = self.clock.today();

        self.store.transaction(|tx| {
            let card = tx
                .card(request.card)?
                .ok_or(PaymentError::CardNotFound(request.card))?;

            let mut decision = evaluate_card(&card, request.amount, today)
                .or_else(|| self.policy.decline(&card, request.amount));

            // The conditional debit is the authority on funds, not the balance read above
            if decision.is_none() && !tx.debit_card(card.id, request.amount)? {
                decision = Some(DeclineReason::InsufficientFunds);
            }

            let record = tx.insert_payment(self.charge_entry(request, decision))?;
            Ok(match decision {
                None => ChargeOutcome::Succeeded { payment: record.id },
                Some(reason) => ChargeOutcome::Declined {
                    payment: record.id,
                    reason,
                },
            })
        })
    }

    fn apply_refund(
        &self,
        payment: PaymentId,
        amount: Option<Amount>,
    ) -> Result<RefundOutcome, PaymentError> {
        if let Some(requested) = amount.filter(|a| !a.is_positive()) {
            return Err(PaymentError::InvalidAmount(requested));
        }

        self.store.transaction(|tx| {
            let original = tx
                .payment(payment)?
                .ok_or(PaymentError::PaymentNotFound(payment))?;

            if original.status != PaymentStatus::Succeeded || original.is_refund() {
                return Err(PaymentError::NotRefundable(payment));
            }

            let remaining = original.amount - tx.refunded_total(payment)?;
            let requested = amount.unwrap_or(original.amount);
            if requested > remaining {
                return Err(PaymentError::RefundExceedsOriginal {
                    payment,
                    requested,
                    remaining,
                });
            }

            if !tx.credit_card(original.card, requested)? {
                return Err(PaymentError::CardNotFound(original.card));
            }
            let record = tx.insert_payment(NewPayment {
                simulated_delay_ms: self.delay_ms,
                ..NewPayment::refund(&original, requested)
            })?;

            Ok(RefundOutcome {
                payment: record.id,
                amount: requested,
            })
        })
    }

    fn charge_entry(&self, request: ChargeRequest, decision: Option<DeclineReason>) -> NewPayment {
        NewPayment {
            card: request.card,
            amount: request.amount,
            currency: self.currency.clone(),
            status: if decision.is_none() {
                PaymentStatus::Succeeded
            } else {
                PaymentStatus::Declined
            },
            category: request.category,
            description: request.description,
            failure_reason: decision,
            target: request.target,
            refund_of: None,
            simulated_delay_ms: self.delay_ms,
        }
    }
}
