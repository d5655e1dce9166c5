//! Migration Ledger - the batch-numbered record of applied migrations
//!
//! One row per applied migration. Rows are inserted in the same transaction
//! that ran the migration SQL and deleted when the migration is rolled back.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use super::definitions::LedgerEntry;
use crate::backends::{DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue};
use crate::error::{OrmError, OrmResult};

pub struct MigrationLedger {
    pool: Arc<dyn DatabasePool>,
    table: String,
}

impl MigrationLedger {
    pub fn new(pool: Arc<dyn DatabasePool>, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist yet
    pub async fn ensure_table(&self) -> OrmResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id {},\n    \
                name VARCHAR(255) NOT NULL UNIQUE,\n    \
                batch BIGINT NOT NULL,\n    \
                applied_at BIGINT NOT NULL\n\
            )",
            self.table,
            self.pool.dialect().surrogate_key()
        );
        self.pool.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Every ledger row in application order
    pub async fn list_applied(&self) -> OrmResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT id, name, batch, applied_at FROM {} ORDER BY batch ASC, id ASC",
            self.table
        );
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Identifiers currently recorded as applied
    pub async fn applied_ids(&self) -> OrmResult<HashSet<String>> {
        let sql = format!("SELECT name FROM {}", self.table);
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        rows.iter().map(|row| row.get_string("name")).collect()
    }

    /// One plus the highest stored batch
    pub async fn next_batch_number(&self) -> OrmResult<i64> {
        Ok(self.latest_batch().await?.unwrap_or(0) + 1)
    }

    /// Highest stored batch, `None` for an empty ledger
    pub async fn latest_batch(&self) -> OrmResult<Option<i64>> {
        let sql = format!("SELECT MAX(batch) AS max_batch FROM {}", self.table);
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        match rows.first() {
            Some(row) => {
                let value = row.get_by_name("max_batch")?;
                if value.is_null() {
                    Ok(None)
                } else {
                    row.get_i64("max_batch").map(Some)
                }
            }
            None => Ok(None),
        }
    }

    /// Rows of one batch in application order
    pub async fn entries_in_batch(&self, batch: i64) -> OrmResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT id, name, batch, applied_at FROM {} WHERE batch = {} ORDER BY id ASC",
            self.table,
            self.pool.dialect().parameter_placeholder(0)
        );
        let rows = self.pool.fetch_all(&sql, &[DatabaseValue::Int64(batch)]).await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Insert a ledger row inside the caller's transaction.
    ///
    /// A second row with the same name violates the unique constraint.
    pub async fn record_applied(
        &self,
        tx: &mut dyn DatabaseTransaction,
        name: &str,
        batch: i64,
    ) -> OrmResult<()> {
        let dialect = self.pool.dialect();
        let sql = format!(
            "INSERT INTO {} (name, batch, applied_at) VALUES ({}, {}, {})",
            self.table,
            dialect.parameter_placeholder(0),
            dialect.parameter_placeholder(1),
            dialect.parameter_placeholder(2)
        );
        let params = [
            DatabaseValue::from(name),
            DatabaseValue::Int64(batch),
            DatabaseValue::Int64(Utc::now().timestamp_millis()),
        ];
        tx.execute(&sql, &params).await?;
        Ok(())
    }

    /// Delete a ledger row inside the caller's transaction
    pub async fn remove(&self, tx: &mut dyn DatabaseTransaction, name: &str) -> OrmResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE name = {}",
            self.table,
            self.pool.dialect().parameter_placeholder(0)
        );
        tx.execute(&sql, &[DatabaseValue::from(name)]).await?;
        Ok(())
    }
}

fn entry_from_row(row: &DatabaseRow) -> OrmResult<LedgerEntry> {
    let applied_at_ms = row.get_i64("applied_at")?;
    Ok(LedgerEntry {
        id: row.get_i64("id")?,
        name: row.get_string("name")?,
        batch: row.get_i64("batch")?,
        applied_at: millis_to_datetime(applied_at_ms)?,
    })
}

fn millis_to_datetime(millis: i64) -> OrmResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| OrmError::Decode(format!("Invalid applied_at timestamp: {}", millis)))
}
