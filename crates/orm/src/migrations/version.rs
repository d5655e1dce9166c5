//! Version Controller - steps the schema to an explicit version
//!
//! State is a single `(version, dirty)` pointer. Every step marks the pointer
//! dirty before running its SQL and clean afterwards, so a failed step leaves
//! the database dirty until an operator forces a version.

use std::sync::Arc;

use super::definitions::{has_executable_sql, MigrateOutcome, Migration, VersionStatus};
use super::files::MigrationManager;
use crate::backends::{DatabasePool, DatabaseValue};
use crate::error::{MigrationError, MigrationResult, OrmError, OrmResult};

/// Stored in place of a version when the pointer is nil but dirty
const NIL_VERSION: i64 = -1;

/// Single-row `(version, dirty)` table
pub struct VersionLedger {
    pool: Arc<dyn DatabasePool>,
    table: String,
}

impl VersionLedger {
    pub fn new(pool: Arc<dyn DatabasePool>, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    pub async fn ensure_table(&self) -> OrmResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                version BIGINT NOT NULL PRIMARY KEY, \
                dirty BOOLEAN NOT NULL\
            )",
            self.table
        );
        self.pool.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Current pointer; an empty table means nothing applied and clean
    pub async fn current(&self) -> OrmResult<VersionStatus> {
        let sql = format!("SELECT version, dirty FROM {} LIMIT 1", self.table);
        let rows = self.pool.fetch_all(&sql, &[]).await?;
        let Some(row) = rows.first() else {
            return Ok(VersionStatus::default());
        };

        let version = row.get_i64("version")?;
        let dirty = row.get_bool("dirty")?;
        let version = if version == NIL_VERSION {
            None
        } else {
            Some(u64::try_from(version).map_err(|_| {
                OrmError::Decode(format!("Invalid stored migration version {}", version))
            })?)
        };
        Ok(VersionStatus { version, dirty })
    }

    /// Replace the pointer atomically
    pub async fn set(&self, status: VersionStatus) -> OrmResult<()> {
        let mut transaction = self.pool.begin_transaction().await?;

        transaction
            .execute(&format!("DELETE FROM {}", self.table), &[])
            .await?;

        if status.version.is_some() || status.dirty {
            let version = match status.version {
                Some(v) => i64::try_from(v).map_err(|_| {
                    OrmError::Configuration(format!("Migration version {} is out of range", v))
                })?,
                None => NIL_VERSION,
            };
            let dialect = self.pool.dialect();
            let sql = format!(
                "INSERT INTO {} (version, dirty) VALUES ({}, {})",
                self.table,
                dialect.parameter_placeholder(0),
                dialect.parameter_placeholder(1)
            );
            transaction
                .execute(&sql, &[DatabaseValue::Int64(version), DatabaseValue::Bool(status.dirty)])
                .await?;
        }

        transaction.commit().await
    }
}

/// Versioned-scheme migration controller
pub struct VersionController {
    manager: MigrationManager,
    ledger: VersionLedger,
}

impl VersionController {
    pub fn new(manager: MigrationManager, pool: Arc<dyn DatabasePool>) -> Self {
        let ledger = VersionLedger::new(pool, manager.config().versions_table.clone());
        Self { manager, ledger }
    }

    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    /// Current version and dirty flag
    pub async fn status(&self) -> MigrationResult<VersionStatus> {
        self.ledger.ensure_table().await?;
        Ok(self.ledger.current().await?)
    }

    /// Step up or down until the current version equals `version`; 0 reverts everything
    pub async fn migrate_to(&self, version: u64) -> MigrationResult<MigrateOutcome> {
        let migrations = self.manager.load_versioned()?;
        let target = if version == 0 {
            None
        } else if migrations.iter().any(|m| m.version == version) {
            Some(version)
        } else {
            return Err(MigrationError::UnknownVersion(version));
        };
        self.step_to(&migrations, target).await
    }

    /// Apply every migration above the current version
    pub async fn up(&self) -> MigrationResult<MigrateOutcome> {
        let migrations = self.manager.load_versioned()?;
        let latest = migrations.last().map(|m| m.version);
        self.step_to(&migrations, latest).await
    }

    /// Revert the single most recently applied migration
    pub async fn rollback_one(&self) -> MigrationResult<MigrateOutcome> {
        let migrations = self.manager.load_versioned()?;
        let current = self.clean_status().await?;

        let Some(version) = current.version else {
            tracing::info!("No migrations applied, nothing to roll back");
            return Ok(MigrateOutcome::NoChange { version: None });
        };

        let position = applied_position(&migrations, Some(version))?;
        let target = position
            .checked_sub(2)
            .map(|index| migrations[index].version);
        self.step_to(&migrations, target).await
    }

    /// Set the pointer and clear the dirty flag without running any SQL.
    ///
    /// This is the manual way out of a dirty state.
    pub async fn force(&self, version: u64) -> MigrationResult<VersionStatus> {
        let target = if version == 0 {
            None
        } else {
            let migrations = self.manager.load_versioned()?;
            if !migrations.iter().any(|m| m.version == version) {
                return Err(MigrationError::UnknownVersion(version));
            }
            Some(version)
        };

        self.ledger.ensure_table().await?;
        let status = VersionStatus::clean(target);
        self.ledger.set(status).await?;
        tracing::warn!(version = ?target, "Forced migration version");
        Ok(status)
    }

    /// Current pointer, failing when dirty
    async fn clean_status(&self) -> MigrationResult<VersionStatus> {
        let current = self.status().await?;
        if current.dirty {
            return Err(MigrationError::Dirty(current.version));
        }
        Ok(current)
    }

    async fn step_to(
        &self,
        migrations: &[Migration],
        target: Option<u64>,
    ) -> MigrationResult<MigrateOutcome> {
        let current = self.clean_status().await?;

        if current.version == target {
            tracing::info!(version = ?target, "Already at target version, no change");
            return Ok(MigrateOutcome::NoChange { version: target });
        }

        let from = applied_position(migrations, current.version)?;
        let to = applied_position(migrations, target)?;

        if to < from {
            for migration in &migrations[to..from] {
                if migration.down_file.is_none() {
                    return Err(MigrationError::MissingDownMigration(migration.up_file.clone()));
                }
            }
        }

        if to > from {
            for index in from..to {
                let migration = &migrations[index];
                self.run_step(&migration.up_file, Some(migration.version)).await?;
            }
        } else {
            for index in (to..from).rev() {
                let migration = &migrations[index];
                let down_file = migration
                    .down_file
                    .as_deref()
                    .ok_or_else(|| {
                        MigrationError::MissingDownMigration(migration.up_file.clone())
                    })?;
                let previous = index.checked_sub(1).map(|i| migrations[i].version);
                self.run_step(down_file, previous).await?;
            }
        }

        let steps = from.abs_diff(to);
        tracing::info!(from = ?current.version, to = ?target, steps, "Migration complete");

        Ok(MigrateOutcome::Migrated {
            from: current.version,
            to: target,
            steps,
        })
    }

    /// Run one script, bracketing it with dirty/clean pointer writes
    async fn run_step(
        &self,
        file_name: &str,
        resulting_version: Option<u64>,
    ) -> MigrationResult<()> {
        let sql = self.manager.read_sql(file_name)?;
        tracing::info!(
            migration = %file_name,
            version = ?resulting_version,
            "Running migration step"
        );

        self.ledger
            .set(VersionStatus {
                version: resulting_version,
                dirty: true,
            })
            .await?;

        if has_executable_sql(&sql) {
            self.ledger
                .pool()
                .execute_script(&sql)
                .await
                .map_err(|e| {
                    tracing::error!(
                        migration = %file_name,
                        error = %e,
                        "Migration step failed, database left dirty"
                    );
                    MigrationError::execution(file_name, e)
                })?;
        }

        self.ledger
            .set(VersionStatus::clean(resulting_version))
            .await?;
        Ok(())
    }
}

/// Number of migrations applied when the pointer is at `version`
fn applied_position(migrations: &[Migration], version: Option<u64>) -> MigrationResult<usize> {
    match version {
        None => Ok(0),
        Some(v) => migrations
            .iter()
            .position(|m| m.version == v)
            .map(|index| index + 1)
            .ok_or(MigrationError::UnknownVersion(v)),
    }
}
