//! # tenantbase-http
//!
//! Structured logging setup and the HTTP server that fronts the database.
//! Request handling beyond the health endpoint lives in downstream crates.

pub mod error;
pub mod logging;
pub mod server;

pub use error::{HttpError, HttpResult};
pub use logging::{init_logging, init_logging_or_fallback, LoggingConfig, LoggingError};
pub use server::{build_router, check_database, start_server, AppState, HealthResponse};
