//! Replays a script of booking and payment operations against both engines.
//!
//! The simulator owns an in-memory store preloaded with the test cards and
//! consumes an async stream of [`Operation`]s. A failed operation is logged and
//! skipped; it never stops the run.

use std::sync::Arc;

use thiserror::Error;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::booking::{BookingController, BookingError};
use crate::config::SimConfig;
use crate::model::{
    CardId, PaymentCategory, PaymentId, ReservationId, Session, SessionId, UserId,
};
use crate::payment::{ChargeRequest, FixedClock, PaymentEngine, PaymentError};
use crate::store::{MemoryStore, StoreError};
use crate::{Amount, seed};

/// One scripted request, as the HTTP layer would issue it.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Administrative setup of a new session.
    AddSession {
        session: SessionId,
        capacity: u32,
        time_slot: String,
    },
    Book {
        user: UserId,
        session: SessionId,
    },
    Cancel {
        user: UserId,
        reservation: ReservationId,
    },
    CancelAll {
        user: UserId,
    },
    SetCapacity {
        session: SessionId,
        capacity: u32,
    },
    Charge {
        card: CardId,
        amount: Amount,
        category: PaymentCategory,
    },
    Refund {
        payment: PaymentId,
        amount: Option<Amount>,
    },
}

/// Error returned by [`Simulator::apply`].
#[derive(Debug, Error)]
pub enum SimError {
    #[error("booking failed: {0}")]
    Booking(#[from] BookingError),

    #[error("payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("session {0} already exists")]
    DuplicateSession(SessionId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Simulator {
    store: Arc<MemoryStore>,
    booking: BookingController<MemoryStore>,
    payments: PaymentEngine<MemoryStore>,
}

impl Simulator {
    pub fn new(config: &SimConfig) -> Result<Self, SimError> {
        let store = Arc::new(MemoryStore::new());
        for card in seed::test_cards() {
            store.add_card(card)?;
        }

        let mut payments = PaymentEngine::new(Arc::clone(&store))
            .with_currency(config.currency.clone())
            .with_delay_ms(config.delay_ms);
        if let Some(today) = config.today {
            payments = payments.with_clock(FixedClock(today));
        }
        let payments = Self::with_chaos(payments, config.chaos_rate);

        Ok(Self {
            booking: BookingController::new(Arc::clone(&store)),
            payments,
            store,
        })
    }

    /// Run the simulator over the given operation stream
    pub async fn run(&self, mut stream: impl Stream<Item = Operation> + Unpin) {
        while let Some(op) = stream.next().await {
            // engines already log their outcome, a failure must not stop the run
            let _ = self.apply(op);
        }
    }

    /// Apply a single operation on top of the current store state
    pub fn apply(&self, op: Operation) -> Result<(), SimError> {
        match op {
            Operation::AddSession {
                session,
                capacity,
                time_slot,
            } => {
                let result = self.add_session(session, capacity, time_slot);
                match &result {
                    Ok(()) => info!(session, capacity, "session added"),
                    Err(e) => info!(session, capacity, reason = %e, "session skipped"),
                }
                result?;
            }
            Operation::Book { user, session } => {
                self.booking.book(user, session)?;
            }
            Operation::Cancel { user, reservation } => {
                self.booking.cancel(user, reservation)?;
            }
            Operation::CancelAll { user } => {
                self.booking.cancel_all(user)?;
            }
            Operation::SetCapacity { session, capacity } => {
                self.booking.set_capacity(session, capacity)?;
            }
            Operation::Charge {
                card,
                amount,
                category,
            } => {
                let request = ChargeRequest::new(card, amount)
                    .category(category)
                    .description(format!("simulated {category} charge"));
                self.payments.charge(request)?;
            }
            Operation::Refund { payment, amount } => {
                self.payments.refund(payment, amount)?;
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn booking(&self) -> &BookingController<MemoryStore> {
        &self.booking
    }

    pub fn payments(&self) -> &PaymentEngine<MemoryStore> {
        &self.payments
    }

    fn add_session(
        &self,
        session: SessionId,
        capacity: u32,
        time_slot: String,
    ) -> Result<(), SimError> {
        if capacity == 0 {
            return Err(BookingError::InvalidCapacity {
                session,
                requested: 0,
                reserved: 0,
            }
            .into());
        }
        // Sessions created from a script are their own class
        if !self
            .store
            .add_session(Session::new(session, session, time_slot, capacity))?
        {
            return Err(SimError::DuplicateSession(session));
        }
        Ok(())
    }

    #[cfg(feature = "chaos")]
    fn with_chaos(
        payments: PaymentEngine<MemoryStore>,
        rate: Option<f64>,
    ) -> PaymentEngine<MemoryStore> {
        match rate {
            Some(rate) if rate > 0.0 => {
                info!(rate, "random declines enabled");
                payments.with_policy(crate::payment::RandomDecline::new(rate))
            }
            _ => payments,
        }
    }

    #[cfg(not(feature = "chaos"))]
    fn with_chaos(
        payments: PaymentEngine<MemoryStore>,
        rate: Option<f64>,
    ) -> PaymentEngine<MemoryStore> {
        if rate.is_some() {
            tracing::warn!("GYM_CHAOS_RATE ignored: built without the `chaos` feature");
        }
        payments
    }
}
