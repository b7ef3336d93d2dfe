//! `AppBus` Server: asynchronous invocation over HTTP with ticket polling.

pub mod network;
pub mod service;
pub mod storage;

pub use network::{build_router, AppState, NetworkConfig, NetworkModule, ShutdownController};
pub use service::{register_builtins, Dispatcher, OperationRegistry, ServerConfig};
pub use storage::{TicketStore, StoreError};
