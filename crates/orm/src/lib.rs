//! # tenantbase-orm: database layer for tenantbase
//!
//! Backend abstraction over PostgreSQL and SQLite plus the SQL migration
//! engine: file discovery, the batch ledger and executor, the versioned
//! controller, scaffolding and validation.

pub mod backends;
pub mod error;
pub mod migrations;

pub use backends::{
    connect, DatabaseBackendType, DatabasePool, DatabasePoolConfig, DatabaseRow,
    DatabaseTransaction, DatabaseValue, SqlDialect,
};
pub use error::*;
pub use migrations::*;
