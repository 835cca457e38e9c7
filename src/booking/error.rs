//! Error types for session booking.

use thiserror::Error;

use crate::model::{ReservationId, SessionId, UserId};
use crate::store::{StoreError, Transient};

/// Error returned by [`BookingController`](super::BookingController) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// Also returned when the reservation belongs to another user.
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    #[error("session {session} is full ({capacity} places)")]
    CapacityExceeded { session: SessionId, capacity: u32 },

    #[error("user {user} already holds a reservation on session {session}")]
    AlreadyBooked { user: UserId, session: SessionId },

    #[error("cannot set capacity of session {session} to {requested}: {reserved} places already reserved")]
    InvalidCapacity {
        session: SessionId,
        requested: u32,
        reserved: u32,
    },

    /// The reservation count disagrees with the reservation rows. Never retried.
    #[error("consistency violation on session {session} releasing reservation {reservation}")]
    ConsistencyViolation {
        session: SessionId,
        reservation: ReservationId,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// A server fault rather than an outcome the caller can act on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BookingError::ConsistencyViolation { .. })
    }
}

impl Transient for BookingError {
    fn is_transient(&self) -> bool {
        matches!(self, BookingError::Store(e) if e.is_retryable())
    }
}
