//! # tenantbase-core
//!
//! Configuration foundation shared by the tenantbase crates: the YAML-backed
//! [`AppConfig`] with environment overrides and its [`ConfigError`] type.

pub mod config;

pub use config::validation::ConfigError;
pub use config::{
    AppConfig, DatabaseConfig, LedgerScheme, LoggerConfig, MigrationsConfig, ServerConfig,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported in logs and the health endpoint
pub const SERVICE_NAME: &str = "tenantbase";
