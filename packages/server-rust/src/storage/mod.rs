//! In-memory ticket storage.
//!
//! - [`Ticket`]: one submitted invocation with its outcome and timestamps
//! - [`TicketStore`]: the process-wide id allocator and ticket table

pub mod ticket;
pub mod ticket_store;

pub use ticket::Ticket;
pub use ticket_store::{StoreError, TicketStats, TicketStore};
