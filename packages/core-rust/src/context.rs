use crate::invocation::InvocationTarget;
use crate::types::TicketId;

/// Per-invocation context handed to an [`Invocable`](crate::Invocable).
/// Lets an operation know which ticket and which instance it is running for.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationContext {
    /// Ticket the outcome will be stored under.
    pub ticket_id: TicketId,
    pub interface: String,
    pub operation: String,
    /// Instance the caller addressed.
    pub target: InvocationTarget,
}
