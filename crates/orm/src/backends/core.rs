//! Core Database Backend Traits
//!
//! The migration engine only talks to these traits; PostgreSQL and SQLite
//! implementations live next to this module.

use async_trait::async_trait;

use crate::error::{OrmError, OrmResult};

/// Abstract database connection pool
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a single parameterized statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute raw SQL text verbatim, possibly containing several statements
    async fn execute_script(&self, sql: &str) -> OrmResult<()>;

    /// Execute a query and return every result row
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>>;

    /// Begin a transaction on a dedicated connection
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>>;

    /// Round-trip a trivial query and report the latency
    async fn health_check(&self) -> OrmResult<std::time::Duration>;

    /// SQL dialect spoken by this pool
    fn dialect(&self) -> SqlDialect;

    /// Close every connection in the pool
    async fn close(&self);
}

/// Abstract database transaction.
///
/// Dropping a transaction that was neither committed nor rolled back rolls it back.
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a single parameterized statement within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64>;

    /// Execute raw SQL text verbatim within the transaction
    async fn execute_script(&mut self, sql: &str) -> OrmResult<()>;

    /// Execute a query and return every result row within the transaction
    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<DatabaseRow>>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> OrmResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}

/// Database value used for parameter binding and result rows
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    String(String),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Booleans come back as 0/1 integers from SQLite
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(b) => Some(*b),
            DatabaseValue::Int64(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A fully decoded result row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow {
    pub fn new(columns: Vec<String>, values: Vec<DatabaseValue>) -> Self {
        Self { columns, values }
    }

    pub fn get_by_index(&self, index: usize) -> OrmResult<&DatabaseValue> {
        self.values
            .get(index)
            .ok_or_else(|| OrmError::Decode(format!("Column index {} out of range", index)))
    }

    pub fn get_by_name(&self, name: &str) -> OrmResult<&DatabaseValue> {
        let index = self
            .columns
            .iter()
            .position(|col| col == name)
            .ok_or_else(|| OrmError::Decode(format!("Column '{}' not found", name)))?;
        self.get_by_index(index)
    }

    pub fn get_i64(&self, name: &str) -> OrmResult<i64> {
        let value = self.get_by_name(name)?;
        value
            .as_i64()
            .ok_or_else(|| {
                OrmError::Decode(format!("Column '{}' is not an integer: {:?}", name, value))
            })
    }

    pub fn get_bool(&self, name: &str) -> OrmResult<bool> {
        let value = self.get_by_name(name)?;
        value
            .as_bool()
            .ok_or_else(|| {
                OrmError::Decode(format!("Column '{}' is not a boolean: {:?}", name, value))
            })
    }

    pub fn get_string(&self, name: &str) -> OrmResult<String> {
        let value = self.get_by_name(name)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| OrmError::Decode(format!("Column '{}' is not text: {:?}", name, value)))
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder for the zero-based parameter `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Column definition for an auto-incrementing 64-bit surrogate key
    pub fn surrogate_key(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "BIGSERIAL PRIMARY KEY",
            SqlDialect::SQLite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct DatabasePoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: Option<u64>,
    pub max_lifetime_seconds: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
            test_before_acquire: true,
        }
    }
}

impl DatabasePoolConfig {
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self.min_connections = self.min_connections.min(max_connections);
        self
    }
}
