//! Session booking with capacity control.
//!
//! The controller guarantees that a session's reservation count never exceeds
//! its capacity and always equals the number of live reservation rows, even
//! when bookings and cancellations race. Each operation is one store
//! transaction: the count change and the row change commit together or not at
//! all.

use std::sync::Arc;

use tracing::{error, info};

use crate::model::{Reservation, ReservationId, Session, SessionId, UserId};
use crate::store::{Store, Transaction};

mod error;
pub use error::BookingError;

/// Booking capacity controller over a shared store.
pub struct BookingController<S> {
    store: Arc<S>,
}

impl<S> Clone for BookingController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

/// Public API
impl<S: Store> BookingController<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reserve one place on `session` for `user`.
    ///
    /// - Ensure the session exists
    /// - Ensure the user does not already hold a place on it
    /// - Increment the count only if it is below capacity
    /// - Insert the reservation row
    pub fn book(&self, user: UserId, session: SessionId) -> Result<Reservation, BookingError> {
        let result = self.store.transaction(|tx| {
            let current = tx
                .session(session)?
                .ok_or(BookingError::SessionNotFound(session))?;

            if tx.user_reservation(user, session)?.is_some() {
                return Err(BookingError::AlreadyBooked { user, session });
            }

            if !tx.increment_reserved(session)? {
                return Err(BookingError::CapacityExceeded {
                    session,
                    capacity: current.capacity,
                });
            }

            Ok(tx.insert_reservation(user, session)?)
        });
        Self::log_result("book", user, u64::from(session), &result);
        result
    }

    /// Cancel one of `user`'s reservations, giving the place back.
    pub fn cancel(
        &self,
        user: UserId,
        reservation: ReservationId,
    ) -> Result<Reservation, BookingError> {
        let result: Result<_, BookingError> = self.store.transaction(|tx| {
            // Another user's reservation is reported exactly like a missing one
            let found = tx
                .reservation(reservation)?
                .filter(|r| r.user == user)
                .ok_or(BookingError::ReservationNotFound(reservation))?;

            Self::release(tx, &found)?;
            Ok(found)
        });
        Self::log_result("cancel", user, reservation, &result);
        result
    }

    /// Cancel every reservation `user` holds, all or nothing.
    pub fn cancel_all(&self, user: UserId) -> Result<Vec<Reservation>, BookingError> {
        let result: Result<_, BookingError> = self.store.transaction(|tx| {
            let owned = tx.reservations_for_user(user)?;
            for reservation in &owned {
                Self::release(tx, reservation)?;
            }
            Ok(owned)
        });

        match &result {
            Ok(cancelled) => info!(user, count = cancelled.len(), "cancel_all applied"),
            Err(e) => Self::log_error("cancel_all", user, None, e),
        }
        result
    }

    /// Change the capacity of `session`. It may never drop below the places already reserved.
    pub fn set_capacity(&self, session: SessionId, capacity: u32) -> Result<Session, BookingError> {
        let result = self.store.transaction(|tx| {
            let current = tx
                .session(session)?
                .ok_or(BookingError::SessionNotFound(session))?;

            let invalid = BookingError::InvalidCapacity {
                session,
                requested: capacity,
                reserved: current.reserved,
            };
            if capacity == 0 || !tx.set_capacity(session, capacity)? {
                return Err(invalid);
            }

            Ok(Session {
                capacity,
                ..current
            })
        });

        match &result {
            Ok(updated) => info!(
                session,
                capacity = updated.capacity,
                reserved = updated.reserved,
                "set_capacity applied"
            ),
            Err(e) => info!(session, capacity, reason = %e, "set_capacity skipped"),
        }
        result
    }

    pub fn session(&self, session: SessionId) -> Result<Option<Session>, BookingError> {
        self.store.transaction(|tx| Ok(tx.session(session)?))
    }

    pub fn reservations_for(&self, user: UserId) -> Result<Vec<Reservation>, BookingError> {
        self.store.transaction(|tx| Ok(tx.reservations_for_user(user)?))
    }
}

/// Private API
impl<S: Store> BookingController<S> {
    /// Decrement the count and delete the row. A count already at zero means
    /// the two have drifted apart, which is fatal for the whole transaction.
    fn release(tx: &mut dyn Transaction, reservation: &Reservation) -> Result<(), BookingError> {
        let violation = BookingError::ConsistencyViolation {
            session: reservation.session,
            reservation: reservation.id,
        };

        if !tx.decrement_reserved(reservation.session)? {
            return Err(violation);
        }
        if !tx.delete_reservation(reservation.id)? {
            return Err(violation);
        }
        Ok(())
    }

    /// Small helper to log operation results
    fn log_result<T>(op: &str, user: UserId, target: u64, result: &Result<T, BookingError>) {
        match result {
            Ok(_) => info!(user, target, "{op} applied"),
            Err(e) => Self::log_error(op, user, Some(target), e),
        }
    }

    fn log_error(op: &str, user: UserId, target: Option<u64>, e: &BookingError) {
        if e.is_fatal() {
            error!(user, target, reason = %e, "{op} failed");
        } else {
            info!(user, target, reason = %e, "{op} skipped");
        }
    }
}
