//! Database Backend Abstractions
//!
//! PostgreSQL serves production deployments; SQLite backs local development
//! and the engine's test-suite. Both implement the same traits.

pub mod core;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use crate::error::{OrmError, OrmResult};

pub use self::core::*;
pub use self::postgres::PostgresPool;
pub use self::sqlite::SqlitePool;

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect database backend type from URL
    pub fn from_url(url: &str) -> OrmResult<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseBackendType::SQLite)
        } else {
            Err(OrmError::Configuration(format!(
                "Unable to detect database backend from URL: {}",
                redact_url(url)
            )))
        }
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

/// Open a pool for `database_url`, picking the backend from its scheme
pub async fn connect(
    database_url: &str,
    config: DatabasePoolConfig,
) -> OrmResult<Arc<dyn DatabasePool>> {
    let backend = DatabaseBackendType::from_url(database_url)?;
    tracing::debug!(backend = %backend, url = %redact_url(database_url), "Connecting to database");

    match backend {
        DatabaseBackendType::PostgreSQL => {
            let pool = PostgresPool::connect(database_url, &config).await?;
            Ok(Arc::new(pool))
        }
        DatabaseBackendType::SQLite => {
            let pool = SqlitePool::connect(database_url, &config).await?;
            Ok(Arc::new(pool))
        }
    }
}

/// Strip the password from a connection URL before it reaches a log line
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    match (authority.rfind('@'), authority.find(':')) {
        (Some(at), Some(colon)) if colon < at => format!(
            "{}{}:****{}",
            &url[..scheme_end + 3],
            &authority[..colon],
            &rest[at..]
        ),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_detection() {
        assert_eq!(
            DatabaseBackendType::from_url("postgres://localhost/app").unwrap(),
            DatabaseBackendType::PostgreSQL
        );
        assert_eq!(
            DatabaseBackendType::from_url("postgresql://localhost/app").unwrap(),
            DatabaseBackendType::PostgreSQL
        );
        assert_eq!(
            DatabaseBackendType::from_url("sqlite::memory:").unwrap(),
            DatabaseBackendType::SQLite
        );
        assert!(DatabaseBackendType::from_url("mysql://localhost/app").is_err());
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://app:secret@db:5432/tenants?sslmode=disable"),
            "postgres://app:****@db:5432/tenants?sslmode=disable"
        );
        assert_eq!(redact_url("postgres://db/tenants"), "postgres://db/tenants");
        assert_eq!(redact_url("sqlite://data.db"), "sqlite://data.db");
    }
}
