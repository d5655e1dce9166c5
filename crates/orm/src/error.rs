//! Error types for the database layer and the migration engine

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// ORM result type alias
pub type OrmResult<T> = Result<T, OrmError>;

/// Migration result type alias
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Backend-level failures raised by the database abstraction
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Cannot reach the database or obtain a connection
    #[error("Connection error: {0}")]
    Connection(String),
    /// Statement failed to execute
    #[error("Query error: {0}")]
    Query(String),
    /// Begin, commit or rollback failed
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// A column could not be converted into a [`DatabaseValue`](crate::DatabaseValue)
    #[error("Decode error: {0}")]
    Decode(String),
    /// Unsupported URL or pool settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors surfaced by migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to {action} {}: {source}", .path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to execute migration {migration}: {message}")]
    Execution { migration: String, message: String },

    #[error("Invalid migration filename '{0}': expected <13-digit timestamp>_<name>.(up|down).sql")]
    InvalidFilename(String),

    #[error("Duplicate migration version {0}")]
    DuplicateVersion(u64),

    #[error("Migration version {0} does not exist in the migrations directory")]
    UnknownVersion(u64),

    #[error("Down migration not found for {0}")]
    MissingDownMigration(String),

    #[error(
        "Database is dirty at version {}; fix the schema manually, then force a clean version",
        version_label(.0)
    )]
    Dirty(Option<u64>),

    #[error(transparent)]
    Database(#[from] OrmError),
}

impl MigrationError {
    pub(crate) fn io(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        MigrationError::FileIo {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn execution(migration: impl Into<String>, err: impl std::fmt::Display) -> Self {
        MigrationError::Execution {
            migration: migration.into(),
            message: err.to_string(),
        }
    }
}

fn version_label(version: &Option<u64>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "nil".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_names_migration() {
        let err = MigrationError::execution(
            "1735689600000_create_users.up.sql",
            OrmError::Query("syntax error at or near \"TABEL\"".to_string()),
        );
        let message = err.to_string();
        assert!(message.contains("1735689600000_create_users.up.sql"));
        assert!(message.contains("syntax error"));
    }

    #[test]
    fn test_file_io_error_names_path() {
        let err = MigrationError::io(
            "read migration file",
            "migrations/1735689600000_x.up.sql",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to read migration file migrations/1735689600000_x.up.sql: no such file"
        );
    }

    #[test]
    fn test_dirty_error_labels() {
        assert!(MigrationError::Dirty(Some(42)).to_string().contains("version 42"));
        assert!(MigrationError::Dirty(None).to_string().contains("version nil"));
    }

    #[test]
    fn test_orm_error_converts() {
        let err: MigrationError = OrmError::Connection("refused".to_string()).into();
        assert_eq!(err.to_string(), "Connection error: refused");
    }
}
