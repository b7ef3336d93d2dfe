//! `AppBus` Core: ticket model, invocation wire types, and argument binding.

pub mod context;
pub mod invocation;
pub mod messages;
pub mod settings;
pub mod signature;
pub mod traits;
pub mod types;

pub use context::InvocationContext;
pub use invocation::{InstanceRef, InvocationRequest, InvocationTarget, RequestError};
pub use messages::{
    ErrorBody, ErrorDetail, InvocationInformation, PollStatusBody, ResultEnvelope,
    SubmissionBody, SubmissionReceipt,
};
pub use settings::{InstanceSettings, SettingError};
pub use signature::{BindError, Param, ParamType, Signature};
pub use traits::{CapabilityRegistry, Invocable};
pub use types::{Failure, FailureKind, Outcome, TicketId, TicketStatus};
