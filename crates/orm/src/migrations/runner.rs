//! Migration Runner - Executes migrations against the database
//!
//! Computes the pending set, applies it as one batch inside a single
//! transaction and records every applied migration in the ledger.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::definitions::{
    has_executable_sql, MigrationRunResult, MigrationStatus, MigrationStatusEntry,
};
use super::files::MigrationManager;
use super::ledger::MigrationLedger;
use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::error::{MigrationError, MigrationResult};

/// Batch-scheme migration executor
pub struct MigrationRunner {
    manager: MigrationManager,
    ledger: MigrationLedger,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(manager: MigrationManager, pool: Arc<dyn DatabasePool>) -> Self {
        let ledger = MigrationLedger::new(pool, manager.config().migrations_table.clone());
        Self { manager, ledger }
    }

    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        self.ledger.pool()
    }

    /// Apply every pending migration as one batch.
    ///
    /// Either the whole pending set is applied and recorded, or nothing is.
    pub async fn run(&self) -> MigrationResult<MigrationRunResult> {
        let start_time = std::time::Instant::now();

        self.ledger.ensure_table().await?;

        let all_migrations = self.manager.list_migrations()?;
        if all_migrations.is_empty() {
            tracing::info!(
                dir = %self.manager.migrations_dir().display(),
                "No migration files found"
            );
            return Ok(MigrationRunResult {
                applied_count: 0,
                applied_migrations: Vec::new(),
                skipped_count: 0,
                batch: None,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        let applied_ids = self.ledger.applied_ids().await?;
        let pending: Vec<String> = all_migrations
            .into_iter()
            .filter(|id| !applied_ids.contains(id))
            .collect();

        if pending.is_empty() {
            tracing::info!("Database is up to date");
            return Ok(MigrationRunResult {
                applied_count: 0,
                applied_migrations: Vec::new(),
                skipped_count: applied_ids.len(),
                batch: None,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        let batch = self.ledger.next_batch_number().await?;
        tracing::info!(count = pending.len(), batch, "Applying pending migrations");

        let mut transaction = self.pool().begin_transaction().await?;
        if let Err(err) = self.apply_batch(transaction.as_mut(), &pending, batch).await {
            if let Err(rollback_err) = transaction.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back migration batch");
            }
            tracing::error!(batch, error = %err, "Migration batch aborted, no changes applied");
            return Err(err);
        }
        transaction.commit().await?;

        tracing::info!(count = pending.len(), batch, "Migration batch committed");

        Ok(MigrationRunResult {
            applied_count: pending.len(),
            applied_migrations: pending,
            skipped_count: applied_ids.len(),
            batch: Some(batch),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn apply_batch(
        &self,
        transaction: &mut dyn DatabaseTransaction,
        pending: &[String],
        batch: i64,
    ) -> MigrationResult<()> {
        for id in pending {
            tracing::info!(migration = %id, batch, "Applying migration");

            let file = self.manager.read_migration(id)?;
            if has_executable_sql(&file.sql) {
                transaction
                    .execute_script(&file.sql)
                    .await
                    .map_err(|e| MigrationError::execution(id.as_str(), e))?;
            } else {
                tracing::debug!(migration = %id, "Migration contains no statements");
            }

            self.ledger
                .record_applied(transaction, id, batch)
                .await
                .map_err(|e| MigrationError::execution(id.as_str(), e))?;
        }
        Ok(())
    }

    /// Applied/pending state of every migration file, plus ledger rows whose
    /// file no longer exists
    pub async fn status(&self) -> MigrationResult<Vec<MigrationStatusEntry>> {
        self.ledger.ensure_table().await?;

        let files = self.manager.list_migrations()?;
        let applied = self.ledger.list_applied().await?;
        let by_name: HashMap<&str, _> = applied.iter().map(|e| (e.name.as_str(), e)).collect();

        let mut entries: Vec<MigrationStatusEntry> = files
            .iter()
            .map(|id| {
                let status = match by_name.get(id.as_str()) {
                    Some(entry) => MigrationStatus::Applied {
                        batch: entry.batch,
                        applied_at: entry.applied_at,
                    },
                    None => MigrationStatus::Pending,
                };
                MigrationStatusEntry {
                    id: id.clone(),
                    status,
                }
            })
            .collect();

        let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();
        entries.extend(
            applied
                .iter()
                .filter(|entry| !on_disk.contains(entry.name.as_str()))
                .map(|entry| MigrationStatusEntry {
                    id: entry.name.clone(),
                    status: MigrationStatus::Missing {
                        batch: entry.batch,
                        applied_at: entry.applied_at,
                    },
                }),
        );

        Ok(entries)
    }
}
