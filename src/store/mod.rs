//! Storage seam for both engines.
//!
//! Every engine operation runs as exactly one [`Store::transaction`]. The
//! [`Transaction`] primitives are row-level and conditional, the way a
//! relational backend would express them (`UPDATE .. WHERE reserved < capacity`
//! and checking rows affected), so an operation never relies on a value it
//! read earlier still being true when it writes.

use thiserror::Error;
use tracing::warn;

use crate::Amount;
use crate::model::{
    CardId, NewPayment, PaymentCard, PaymentId, PaymentRecord, Reservation, ReservationId,
    Session, SessionId, UserId,
};

mod memory;
pub use memory::MemoryStore;

/// Failure of the storage layer itself, never of business rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Serialization conflict or lock timeout; the whole operation may be re-run.
    #[error("transaction conflict")]
    Conflict,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

/// Errors that can tell whether re-running the operation from scratch may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }
}

/// A unit of work against the store. Writes are visible to later reads in the
/// same transaction and to nobody else until commit.
pub trait Transaction {
    fn session(&mut self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// `reserved += 1` if `reserved < capacity`. Returns whether a row was updated.
    fn increment_reserved(&mut self, id: SessionId) -> Result<bool, StoreError>;

    /// `reserved -= 1` if `reserved > 0`. Returns whether a row was updated.
    fn decrement_reserved(&mut self, id: SessionId) -> Result<bool, StoreError>;

    /// Overwrite capacity if the new value is still `>= reserved`. Returns whether a row was updated.
    fn set_capacity(&mut self, id: SessionId, capacity: u32) -> Result<bool, StoreError>;

    fn insert_reservation(
        &mut self,
        user: UserId,
        session: SessionId,
    ) -> Result<Reservation, StoreError>;

    fn reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    /// Live reservation of `user` on `session`, if any.
    fn user_reservation(
        &mut self,
        user: UserId,
        session: SessionId,
    ) -> Result<Option<Reservation>, StoreError>;

    fn delete_reservation(&mut self, id: ReservationId) -> Result<bool, StoreError>;

    fn reservations_for_user(&mut self, user: UserId) -> Result<Vec<Reservation>, StoreError>;

    fn card(&mut self, id: CardId) -> Result<Option<PaymentCard>, StoreError>;

    /// `balance -= amount` if `balance >= amount`. Returns whether a row was updated.
    fn debit_card(&mut self, id: CardId, amount: Amount) -> Result<bool, StoreError>;

    /// `balance += amount`. Returns whether a row was updated.
    fn credit_card(&mut self, id: CardId, amount: Amount) -> Result<bool, StoreError>;

    /// Append a ledger entry. Existing entries are never updated.
    fn insert_payment(&mut self, payment: NewPayment) -> Result<PaymentRecord, StoreError>;

    fn payment(&mut self, id: PaymentId) -> Result<Option<PaymentRecord>, StoreError>;

    /// Ledger entries for `card` in insertion order.
    fn payments_for_card(&mut self, card: CardId) -> Result<Vec<PaymentRecord>, StoreError>;

    /// Sum of all refunds recorded against `original`, as a positive amount.
    fn refunded_total(&mut self, original: PaymentId) -> Result<Amount, StoreError>;
}

/// Shared relational store.
pub trait Store: Send + Sync {
    /// Run `f` as one atomic unit: its writes commit together if it returns
    /// `Ok`, and none of them are visible if it returns `Err`.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StoreError>;
}

/// Re-run `op` while it fails with a transient error, up to `attempts` times in total.
///
/// Each attempt must be a complete atomic operation starting from its
/// precondition checks; nothing is resumed.
pub fn retry_transient<T, E, F>(attempts: u32, mut op: F) -> Result<T, E>
where
    E: Transient + std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(attempt, reason = %e, "transient store failure, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}
