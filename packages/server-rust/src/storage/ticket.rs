//! Ticket records held by the [`TicketStore`](super::TicketStore).

use std::sync::Arc;
use std::time::Instant;

use appbus_core::{Outcome, TicketId, TicketStatus};

/// One submitted invocation and its lifecycle state.
///
/// Server-internal. Only the id, status and outcome ever reach the wire;
/// the timestamps drive eviction.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: TicketId,
    /// Set exactly once, when the dispatched operation returns.
    pub outcome: Option<Arc<Outcome>>,
    pub created_at: Instant,
    pub completed_at: Option<Instant>,
    /// First successful fetch of the outcome.
    pub retrieved_at: Option<Instant>,
}

impl Ticket {
    /// Creates a pending ticket.
    #[must_use]
    pub fn new(id: TicketId, now: Instant) -> Self {
        Self {
            id,
            outcome: None,
            created_at: now,
            completed_at: None,
            retrieved_at: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> TicketStatus {
        if self.outcome.is_some() {
            TicketStatus::Ready
        } else {
            TicketStatus::Pending
        }
    }

    /// Records a read of the outcome. Only the first read is kept.
    pub fn on_retrieve(&mut self, now: Instant) {
        self.retrieved_at.get_or_insert(now);
    }

    /// Whether the outcome was first read at or before `cutoff`.
    #[must_use]
    pub fn retrieved_before(&self, cutoff: Instant) -> bool {
        self.retrieved_at.is_some_and(|at| at <= cutoff)
    }

    /// Whether the ticket completed at or before `cutoff`, read or not.
    #[must_use]
    pub fn completed_before(&self, cutoff: Instant) -> bool {
        self.completed_at.is_some_and(|at| at <= cutoff)
    }
}
