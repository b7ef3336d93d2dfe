//! Invocation dispatch framework.
//!
//! 1. **Registry** (`registry`): `(interface, operation)` -> invocable code
//! 2. **Dispatcher** (`dispatcher`): ticket issue, resolution, argument binding
//! 3. **Middleware** (`middleware`): Tower layers (concurrency limit, timeout, metrics)
//! 4. **Invoker** (`invoker`): runs the operation on its own task
//! 5. **Background workers** (`worker`): periodic ticket eviction

pub mod builtin;
pub mod config;
pub mod dispatcher;
pub mod invoker;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod worker;

// Re-export key types for convenient access.
pub use builtin::register_builtins;
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use operation::{Invocation, InvocationError, SubmitError};
pub use registry::{AsyncFnOperation, FnOperation, OperationRegistry};
pub use worker::{BackgroundWorker, EvictionSweeper, PeriodicTask};
