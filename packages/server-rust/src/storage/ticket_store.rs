//! Thread-safe ticket table with monotonic id allocation.
//!
//! A single `parking_lot::Mutex` guards both the id counter and the map, so
//! allocating an id and inserting its ticket happen as one step: no reader
//! can ever observe an allocated id without its ticket. The lock is only
//! held for map bookkeeping, never while an operation runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use appbus_core::{Outcome, TicketId, TicketStatus};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::ticket::Ticket;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown ticket {0}")]
    UnknownTicket(TicketId),
    #[error("ticket {0} is not ready")]
    NotReady(TicketId),
    #[error("ticket {0} already completed")]
    AlreadyCompleted(TicketId),
}

// ---------------------------------------------------------------------------
// TicketStats
// ---------------------------------------------------------------------------

/// Point-in-time ticket counts, reported by the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub pending: usize,
    pub ready: usize,
    /// Ready tickets whose outcome was fetched at least once.
    pub retrieved: usize,
    /// Highest id handed out so far; 0 before the first submission.
    pub last_id: u64,
}

// ---------------------------------------------------------------------------
// TicketStore
// ---------------------------------------------------------------------------

struct Inner {
    next_id: u64,
    tickets: HashMap<u64, Ticket>,
}

/// Process-wide registry of tickets, shared behind an `Arc`.
pub struct TicketStore {
    inner: Mutex<Inner>,
}

impl TicketStore {
    /// Creates an empty store. The first allocated id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                tickets: HashMap::new(),
            }),
        }
    }

    /// Allocates the next id and inserts a pending ticket for it.
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted; ids are never wrapped or reused.
    pub fn create(&self) -> TicketId {
        let mut inner = self.inner.lock();
        let id = TicketId(inner.next_id);
        inner.next_id = inner
            .next_id
            .checked_add(1)
            .unwrap_or_else(|| panic!("ticket id space exhausted"));
        inner.tickets.insert(id.0, Ticket::new(id, Instant::now()));
        id
    }

    /// Stores the outcome and flips the ticket to ready.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownTicket`] if the id was never issued (or was
    /// evicted), [`StoreError::AlreadyCompleted`] if an outcome is already
    /// stored. The stored outcome is never overwritten.
    pub fn complete(&self, id: TicketId, outcome: Outcome) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let ticket = inner
            .tickets
            .get_mut(&id.0)
            .ok_or(StoreError::UnknownTicket(id))?;
        if ticket.outcome.is_some() {
            return Err(StoreError::AlreadyCompleted(id));
        }
        ticket.outcome = Some(Arc::new(outcome));
        ticket.completed_at = Some(Instant::now());
        Ok(())
    }

    /// Current status, or `None` for an unknown id. Has no side effects.
    #[must_use]
    pub fn status(&self, id: TicketId) -> Option<TicketStatus> {
        self.inner.lock().tickets.get(&id.0).map(Ticket::status)
    }

    /// Returns the stored outcome. Every call returns the same value.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownTicket`] for unknown ids and
    /// [`StoreError::NotReady`] while the ticket is still pending.
    pub fn fetch(&self, id: TicketId) -> Result<Arc<Outcome>, StoreError> {
        let mut inner = self.inner.lock();
        let ticket = inner
            .tickets
            .get_mut(&id.0)
            .ok_or(StoreError::UnknownTicket(id))?;
        let outcome = ticket.outcome.clone().ok_or(StoreError::NotReady(id))?;
        ticket.on_retrieve(Instant::now());
        Ok(outcome)
    }

    #[must_use]
    pub fn stats(&self) -> TicketStats {
        let inner = self.inner.lock();
        let mut stats = TicketStats {
            last_id: inner.next_id - 1,
            ..TicketStats::default()
        };
        for ticket in inner.tickets.values() {
            match ticket.status() {
                TicketStatus::Pending => stats.pending += 1,
                TicketStatus::Ready => stats.ready += 1,
            }
            if ticket.retrieved_at.is_some() {
                stats.retrieved += 1;
            }
        }
        stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().tickets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().tickets.is_empty()
    }

    /// Removes tickets whose outcome was first fetched more than `ttl`
    /// before `now`. Returns the number removed.
    pub fn evict_retrieved(&self, ttl: Duration, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(ttl) else {
            return 0;
        };
        self.evict_where(|ticket| ticket.retrieved_before(cutoff))
    }

    /// Removes ready tickets completed more than `ttl` before `now`,
    /// whether or not anyone fetched them. Pending tickets are never evicted.
    pub fn evict_completed(&self, ttl: Duration, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(ttl) else {
            return 0;
        };
        self.evict_where(|ticket| ticket.completed_before(cutoff))
    }

    fn evict_where(&self, predicate: impl Fn(&Ticket) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.tickets.len();
        inner.tickets.retain(|_, ticket| !predicate(ticket));
        let removed = before - inner.tickets.len();
        if removed > 0 {
            debug!(removed, remaining = inner.tickets.len(), "evicted tickets");
        }
        removed
    }
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
