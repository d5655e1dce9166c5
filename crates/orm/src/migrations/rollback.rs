//! Migration Rollback - reverts the most recent batch
//!
//! Down scripts run in reverse application order inside one transaction and
//! each reverted migration's ledger row is deleted.

use super::definitions::{has_executable_sql, RollbackResult};
use super::files::down_file_name;
use super::runner::MigrationRunner;
use crate::backends::DatabaseTransaction;
use crate::error::{MigrationError, MigrationResult};

/// A ledger row paired with its resolved down script
struct RollbackStep {
    id: String,
    down_file: String,
    sql: String,
}

impl MigrationRunner {
    /// Roll back the last batch of migrations.
    ///
    /// All down scripts are read before anything runs; a missing one aborts
    /// without touching the database.
    pub async fn rollback(&self) -> MigrationResult<RollbackResult> {
        let start_time = std::time::Instant::now();

        self.ledger().ensure_table().await?;

        let Some(batch) = self.ledger().latest_batch().await? else {
            tracing::info!("Nothing to roll back");
            return Ok(RollbackResult {
                rolled_back_count: 0,
                rolled_back_migrations: Vec::new(),
                batch: None,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        };

        let mut entries = self.ledger().entries_in_batch(batch).await?;
        entries.reverse();

        let mut steps = Vec::with_capacity(entries.len());
        for entry in entries {
            if !self.manager().has_down_file(&entry.name) {
                return Err(MigrationError::MissingDownMigration(entry.name));
            }
            let down_file = down_file_name(&entry.name);
            let sql = self.manager().read_sql(&down_file)?;
            steps.push(RollbackStep {
                id: entry.name,
                down_file,
                sql,
            });
        }

        tracing::info!(batch, count = steps.len(), "Rolling back batch");

        let mut transaction = self.pool().begin_transaction().await?;
        if let Err(err) = self.revert_steps(transaction.as_mut(), &steps).await {
            if let Err(rollback_err) = transaction.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to abort rollback transaction");
            }
            return Err(err);
        }
        transaction.commit().await?;

        let rolled_back_migrations: Vec<String> = steps.into_iter().map(|s| s.id).collect();
        tracing::info!(batch, count = rolled_back_migrations.len(), "Batch rolled back");

        Ok(RollbackResult {
            rolled_back_count: rolled_back_migrations.len(),
            rolled_back_migrations,
            batch: Some(batch),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn revert_steps(
        &self,
        transaction: &mut dyn DatabaseTransaction,
        steps: &[RollbackStep],
    ) -> MigrationResult<()> {
        for step in steps {
            tracing::info!(migration = %step.id, "Rolling back migration");

            if has_executable_sql(&step.sql) {
                transaction
                    .execute_script(&step.sql)
                    .await
                    .map_err(|e| MigrationError::execution(step.down_file.as_str(), e))?;
            }

            self.ledger()
                .remove(transaction, &step.id)
                .await
                .map_err(|e| MigrationError::execution(step.id.as_str(), e))?;
        }
        Ok(())
    }
}
