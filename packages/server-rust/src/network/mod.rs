//! HTTP surface: configuration, routes, error mapping, and shutdown control.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::*;
pub use error::{ApiError, ApiResult};
pub use handlers::AppState;
pub use module::{build_router, NetworkModule};
pub use shutdown::*;
