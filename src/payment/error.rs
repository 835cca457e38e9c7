//! Error types for payment processing.

use thiserror::Error;

use crate::Amount;
use crate::model::{CardId, PaymentId};
use crate::store::{StoreError, Transient};

/// Error returned by [`PaymentEngine`](super::PaymentEngine) operations.
///
/// A declined charge is not an error; see [`ChargeOutcome`](super::ChargeOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("amount {0} must be positive")]
    InvalidAmount(Amount),

    #[error("card {0} not found")]
    CardNotFound(CardId),

    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// Declined charges and refund entries cannot be refunded.
    #[error("payment {0} is not refundable")]
    NotRefundable(PaymentId),

    #[error("refund of {requested} on payment {payment} exceeds the {remaining} still refundable")]
    RefundExceedsOriginal {
        payment: PaymentId,
        requested: Amount,
        remaining: Amount,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Transient for PaymentError {
    fn is_transient(&self) -> bool {
        matches!(self, PaymentError::Store(e) if e.is_retryable())
    }
}
