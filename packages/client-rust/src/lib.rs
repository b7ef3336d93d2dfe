//! `AppBus` Client: submit an invocation, poll its ticket, fetch the outcome.

pub mod client;
pub mod config;
pub mod error;

pub use client::{InvocationClient, PollState, Submission};
pub use config::{ClientConfig, PollPolicy, DEFAULT_BASE_PATH};
pub use error::ClientError;
pub use tokio_util::sync::CancellationToken;
