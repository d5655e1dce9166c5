//! PostgreSQL Backend Implementation
//!
//! Implements the backend traits on top of sqlx's PostgreSQL driver.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Pool, Postgres, Row, TypeInfo, ValueRef};

use super::core::*;
use crate::error::{OrmError, OrmResult};

/// PostgreSQL connection pool implementation
pub struct PostgresPool {
    pool: Pool<Postgres>,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, config: &DatabasePoolConfig) -> OrmResult<Self> {
        let mut options = PgPoolOptions::new()
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
            .connect(database_url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let query = bind_all(sqlx::query(sql), params);
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| OrmError::Query(format!("Query execution failed: {}", e)))?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&self, sql: &str) -> OrmResult<()> {
        // A bare &str goes over the simple query protocol, which accepts several statements
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
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
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
        SqlDialect::PostgreSQL
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
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
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
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

fn convert_row(row: &PgRow) -> OrmResult<DatabaseRow> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let values = (0..columns.len())
        .map(|index| convert_value(row, index))
        .collect::<OrmResult<Vec<_>>>()?;
    Ok(DatabaseRow::new(columns, values))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn convert_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| OrmError::Decode(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let decode_err = |e: sqlx::Error| {
        OrmError::Decode(format!("Failed to decode {} column {}: {}", type_name, index, e))
    };

    match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(DatabaseValue::Bool).map_err(decode_err),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(|v| DatabaseValue::Int64(v.into()))
            .map_err(decode_err),
        "INT4" => row
            .try_get::<i32, _>(index)
            .map(|v| DatabaseValue::Int64(v.into()))
            .map_err(decode_err),
        "INT8" => row.try_get::<i64, _>(index).map(DatabaseValue::Int64).map_err(decode_err),
        _ => row
            .try_get::<String, _>(index)
            .map(DatabaseValue::String)
            .map_err(decode_err),
    }
}
