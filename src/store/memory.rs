use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::Amount;
use crate::model::{
    CardId, NewPayment, PaymentCard, PaymentId, PaymentRecord, Reservation, ReservationId,
    Session, SessionId, UserId,
};

use super::{Store, StoreError, Transaction};

/// In-memory store with serializable isolation.
///
/// A single lock covers all tables. A transaction reads through to the
/// committed tables and stages its writes in a [`Journal`], which is applied
/// on commit and dropped otherwise, so a failed operation leaves no trace.
/// Commit cost depends on what the transaction touched, never on history.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Number of upcoming commits to reject with [`StoreError::Conflict`].
    pending_conflicts: AtomicU32,
}

#[derive(Debug, Default)]
struct Tables {
    sessions: BTreeMap<SessionId, Session>,
    reservations: BTreeMap<ReservationId, Reservation>,
    /// Live reservation per (user, session).
    by_user: BTreeMap<(UserId, SessionId), ReservationId>,
    cards: BTreeMap<CardId, PaymentCard>,
    payments: BTreeMap<PaymentId, PaymentRecord>,
    by_card: BTreeMap<CardId, Vec<PaymentId>>,
    /// Positive sum of refunds recorded against each original payment.
    refunded: BTreeMap<PaymentId, Amount>,
    last_reservation: ReservationId,
    last_payment: PaymentId,
}

impl Tables {
    fn insert_reservation_row(&mut self, reservation: Reservation) {
        self.last_reservation = self.last_reservation.max(reservation.id);
        self.by_user
            .insert((reservation.user, reservation.session), reservation.id);
        self.reservations.insert(reservation.id, reservation);
    }

    fn remove_reservation_row(&mut self, id: ReservationId) {
        if let Some(r) = self.reservations.remove(&id) {
            let key = (r.user, r.session);
            if self.by_user.get(&key) == Some(&id) {
                self.by_user.remove(&key);
            }
        }
    }

    fn insert_payment_row(&mut self, record: PaymentRecord) {
        self.last_payment = self.last_payment.max(record.id);
        self.by_card.entry(record.card).or_default().push(record.id);
        if let Some(original) = record.refund_of {
            *self.refunded.entry(original).or_insert(Amount::ZERO) -= record.amount;
        }
        self.payments.insert(record.id, record);
    }

    fn apply(&mut self, changes: Changes) {
        self.sessions.extend(changes.sessions);
        self.cards.extend(changes.cards);
        for id in changes.deleted {
            self.remove_reservation_row(id);
        }
        for reservation in changes.inserted.into_values() {
            self.insert_reservation_row(reservation);
        }
        for record in changes.payments {
            self.insert_payment_row(record);
        }
    }
}

/// Writes staged by one transaction.
#[derive(Debug, Default)]
struct Changes {
    /// Full copies of the session rows touched.
    sessions: BTreeMap<SessionId, Session>,
    /// Full copies of the card rows touched.
    cards: BTreeMap<CardId, PaymentCard>,
    inserted: BTreeMap<ReservationId, Reservation>,
    /// Committed reservations deleted by this transaction.
    deleted: BTreeSet<ReservationId>,
    payments: Vec<PaymentRecord>,
    last_reservation: ReservationId,
    last_payment: PaymentId,
}

/// Transaction view: committed tables underneath, staged changes on top.
struct Journal<'a> {
    base: &'a Tables,
    changes: Changes,
}

impl<'a> Journal<'a> {
    fn new(base: &'a Tables) -> Self {
        Self {
            base,
            changes: Changes {
                last_reservation: base.last_reservation,
                last_payment: base.last_payment,
                ..Changes::default()
            },
        }
    }

    fn into_changes(self) -> Changes {
        self.changes
    }

    fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        if !self.changes.sessions.contains_key(&id) {
            let row = self.base.sessions.get(&id)?.clone();
            self.changes.sessions.insert(id, row);
        }
        self.changes.sessions.get_mut(&id)
    }

    fn card_mut(&mut self, id: CardId) -> Option<&mut PaymentCard> {
        if !self.changes.cards.contains_key(&id) {
            let row = self.base.cards.get(&id)?.clone();
            self.changes.cards.insert(id, row);
        }
        self.changes.cards.get_mut(&id)
    }

    fn committed_reservation(&self, id: ReservationId) -> Option<Reservation> {
        if self.changes.deleted.contains(&id) {
            return None;
        }
        self.base.reservations.get(&id).copied()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a session row as-is. Returns `false` if the id is taken.
    pub fn add_session(&self, session: Session) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        if tables.sessions.contains_key(&session.id) {
            return Ok(false);
        }
        tables.sessions.insert(session.id, session);
        Ok(true)
    }

    /// Load a card row as-is, replacing any card with the same id.
    pub fn add_card(&self, card: PaymentCard) -> Result<(), StoreError> {
        self.lock()?.cards.insert(card.id, card);
        Ok(())
    }

    /// Load an existing reservation row without touching the session's count.
    pub fn add_reservation(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.lock()?.insert_reservation_row(reservation);
        Ok(())
    }

    /// Make the next `count` commits fail with a conflict after their work ran.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn sessions(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.lock()?.sessions.values().cloned().collect())
    }

    pub fn cards(&self) -> Result<Vec<PaymentCard>, StoreError> {
        Ok(self.lock()?.cards.values().cloned().collect())
    }

    pub fn reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.lock()?.reservations.values().copied().collect())
    }

    /// All ledger entries in insertion order.
    pub fn ledger(&self) -> Result<Vec<PaymentRecord>, StoreError> {
        Ok(self.lock()?.payments.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Store for MemoryStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut committed = self.lock()?;

        let mut journal = Journal::new(&committed);
        let value = f(&mut journal)?;
        let changes = journal.into_changes();

        if self.take_conflict() {
            return Err(StoreError::Conflict.into());
        }

        committed.apply(changes);
        Ok(value)
    }
}

impl Transaction for Journal<'_> {
    fn session(&mut self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self
            .changes
            .sessions
            .get(&id)
            .or_else(|| self.base.sessions.get(&id))
            .cloned())
    }

    fn increment_reserved(&mut self, id: SessionId) -> Result<bool, StoreError> {
        match self.session_mut(id) {
            Some(session) if session.reserved < session.capacity => {
                session.reserved += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn decrement_reserved(&mut self, id: SessionId) -> Result<bool, StoreError> {
        match self.session_mut(id) {
            Some(session) if session.reserved > 0 => {
                session.reserved -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_capacity(&mut self, id: SessionId, capacity: u32) -> Result<bool, StoreError> {
        match self.session_mut(id) {
            Some(session) if session.reserved <= capacity => {
                session.capacity = capacity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn insert_reservation(
        &mut self,
        user: UserId,
        session: SessionId,
    ) -> Result<Reservation, StoreError> {
        self.changes.last_reservation += 1;
        let reservation = Reservation {
            id: self.changes.last_reservation,
            user,
            session,
        };
        self.changes.inserted.insert(reservation.id, reservation);
        Ok(reservation)
    }

    fn reservation(&mut self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self
            .changes
            .inserted
            .get(&id)
            .copied()
            .or_else(|| self.committed_reservation(id)))
    }

    fn user_reservation(
        &mut self,
        user: UserId,
        session: SessionId,
    ) -> Result<Option<Reservation>, StoreError> {
        let staged = self
            .changes
            .inserted
            .values()
            .find(|r| r.user == user && r.session == session)
            .copied();
        Ok(staged.or_else(|| {
            let id = self.base.by_user.get(&(user, session))?;
            self.committed_reservation(*id)
        }))
    }

    fn delete_reservation(&mut self, id: ReservationId) -> Result<bool, StoreError> {
        if self.changes.inserted.remove(&id).is_some() {
            return Ok(true);
        }
        if self.committed_reservation(id).is_none() {
            return Ok(false);
        }
        Ok(self.changes.deleted.insert(id))
    }

    fn reservations_for_user(&mut self, user: UserId) -> Result<Vec<Reservation>, StoreError> {
        let committed = self
            .base
            .by_user
            .range((user, SessionId::MIN)..=(user, SessionId::MAX))
            .filter_map(|(_, id)| self.committed_reservation(*id));
        let staged = self
            .changes
            .inserted
            .values()
            .filter(|r| r.user == user)
            .copied();

        let mut owned: Vec<_> = committed.chain(staged).collect();
        owned.sort_unstable_by_key(|r| r.id);
        Ok(owned)
    }

    fn card(&mut self, id: CardId) -> Result<Option<PaymentCard>, StoreError> {
        Ok(self
            .changes
            .cards
            .get(&id)
            .or_else(|| self.base.cards.get(&id))
            .cloned())
    }

    fn debit_card(&mut self, id: CardId, amount: Amount) -> Result<bool, StoreError> {
        match self.card_mut(id) {
            Some(card) if card.balance >= amount => {
                card.balance -= amount;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn credit_card(&mut self, id: CardId, amount: Amount) -> Result<bool, StoreError> {
        match self.card_mut(id) {
            Some(card) => {
                card.balance += amount;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_payment(&mut self, payment: NewPayment) -> Result<PaymentRecord, StoreError> {
        self.changes.last_payment += 1;
        let record = payment.into_record(self.changes.last_payment);
        self.changes.payments.push(record.clone());
        Ok(record)
    }

    fn payment(&mut self, id: PaymentId) -> Result<Option<PaymentRecord>, StoreError> {
        Ok(self
            .base
            .payments
            .get(&id)
            .or_else(|| self.changes.payments.iter().find(|p| p.id == id))
            .cloned())
    }

    fn payments_for_card(&mut self, card: CardId) -> Result<Vec<PaymentRecord>, StoreError> {
        let committed = self
            .base
            .by_card
            .get(&card)
            .into_iter()
            .flatten()
            .filter_map(|id| self.base.payments.get(id));
        let staged = self.changes.payments.iter().filter(|p| p.card == card);
        Ok(committed.chain(staged).cloned().collect())
    }

    fn refunded_total(&mut self, original: PaymentId) -> Result<Amount, StoreError> {
        let committed = self
            .base
            .refunded
            .get(&original)
            .copied()
            .unwrap_or(Amount::ZERO);
        let staged: Amount = self
            .changes
            .payments
            .iter()
            .filter(|p| p.refund_of == Some(original))
            .map(|p| -p.amount)
            .sum();
        Ok(committed + staged)
    }
}
