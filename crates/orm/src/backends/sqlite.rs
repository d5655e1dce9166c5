//! SQLite Backend Implementation
//!
//! Used for local development and as the backing store of the engine tests.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Pool, Row, TypeInfo, ValueRef};

use super::core::*;
use crate::error::{OrmError, OrmResult};

/// SQLite connection pool implementation
pub struct SqlitePool {
    pool: Pool<Sqlite>,
}

impl SqlitePool {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open a pool, creating the database file when it does not exist yet
    pub async fn connect(database_url: &str, config: &DatabasePoolConfig) -> OrmResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| OrmError::Configuration(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true);

        let mut options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = config.max_lifetime_seconds {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options
            .connect_with(connect_options)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create SQLite pool: {}", e)))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let query = bind_all(sqlx::query(sql), params);
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| OrmError::Query(format!("Query execution failed: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&self, sql: &str) -> OrmResult<()> {
        (&self.pool)
            .execute(sql)
            .await
            .map_err(|e| OrmError::Query(e.to_string()))?;
        Ok(())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<DatabaseRow>> {
        let query = bind_all(sqlx::query(sql), params);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OrmError::Query(format!("Query fetch failed: {}", e)))?;
        rows.iter().map(convert_row).collect()
    }

    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OrmError::Transaction(format!("Failed to start transaction: {}", e)))?;
        Ok(Box::new(SqliteTransaction { tx: Some(tx) }))
    }

    async fn health_check(&self) -> OrmResult<Duration> {
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| OrmError::Connection(format!("Health check failed: {}", e)))?;
        Ok(start.elapsed())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteTransaction {
    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, Sqlite>> {
        self.tx
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let tx = self.active()?;
        let query = bind_all(sqlx::query(sql), params);
        let result = query
            .execute(&mut **tx)
            .await
            .map_err(|e| OrmError::Query(format!("Query execution failed: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> OrmResult<()> {
        let tx = self.active()?;
        (&mut **tx)
            .execute(sql)
            .await
            .map_err(|e| OrmError::Query(e.to_string()))?;
        Ok(())
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<DatabaseRow>> {
        let tx = self.active()?;
        let query = bind_all(sqlx::query(sql), params);
        let rows = query
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| OrmError::Query(format!("Query fetch failed: {}", e)))?;
        rows.iter().map(convert_row).collect()
    }

    async fn commit(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;
        tx.commit()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;
        tx.rollback()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[DatabaseValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Bool(b) => query.bind(*b),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::String(s) => query.bind(s.clone()),
        };
    }
    query
}

fn convert_row(row: &SqliteRow) -> OrmResult<DatabaseRow> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..columns.len())
        .map(|index| convert_value(row, index))
        .collect::<OrmResult<Vec<_>>>()?;
    Ok(DatabaseRow::new(columns, values))
}

/// SQLite reports the storage class of the stored value, not the declared column type
fn convert_value(row: &SqliteRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| OrmError::Decode(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(DatabaseValue::Bool)
            .map_err(|e| OrmError::Decode(e.to_string())),
        "INTEGER" => row
            .try_get::<i64, _>(index)
            .map(DatabaseValue::Int64)
            .map_err(|e| OrmError::Decode(e.to_string())),
        "TEXT" => row
            .try_get::<String, _>(index)
            .map(DatabaseValue::String)
            .map_err(|e| OrmError::Decode(e.to_string())),
        other => {
            if let Ok(v) = row.try_get::<i64, _>(index) {
                Ok(DatabaseValue::Int64(v))
            } else if let Ok(v) = row.try_get::<String, _>(index) {
                Ok(DatabaseValue::String(v))
            } else {
                Err(OrmError::Decode(format!(
                    "Unsupported SQLite type {} in column {}",
                    other, index
                )))
            }
        }
    }
}
