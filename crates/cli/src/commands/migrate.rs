use anyhow::{bail, Context};
use std::path::Path;
use std::sync::Arc;

use tenantbase_core::{AppConfig, LedgerScheme};
use tenantbase_orm::{
    DatabasePool, MigrateOutcome, MigrationManager, MigrationRunner, MigrationStatus,
    VersionController, VersionStatus,
};

use super::{connect_database, migration_manager};

/// Migration engine selected by `migrations.scheme`
enum Engine {
    Batch(MigrationRunner),
    Versioned(VersionController),
}

async fn open_engine(config: &AppConfig) -> anyhow::Result<(Engine, Arc<dyn DatabasePool>)> {
    let pool = connect_database(config).await?;
    let manager = migration_manager(config);
    let engine = match config.migrations.scheme {
        LedgerScheme::Batch => Engine::Batch(MigrationRunner::new(manager, pool.clone())),
        LedgerScheme::Versioned => Engine::Versioned(VersionController::new(manager, pool.clone())),
    };
    Ok((engine, pool))
}

/// `applied`, `pending`, or `dirty` for the version the pointer rests on while dirty
fn version_state(version: u64, status: &VersionStatus) -> &'static str {
    let current = status.version.unwrap_or(0);
    if status.dirty && status.version == Some(version) {
        "dirty"
    } else if version <= current {
        "applied"
    } else {
        "pending"
    }
}

fn print_outcome(outcome: &MigrateOutcome) {
    match outcome {
        MigrateOutcome::NoChange { version } => {
            println!("No change: already at version {}", version.unwrap_or(0));
        }
        MigrateOutcome::Migrated { from, to, steps } => {
            println!(
                "Migrated from version {} to {} ({} step(s))",
                from.unwrap_or(0),
                to.unwrap_or(0),
                steps
            );
        }
    }
}

pub fn create(dir: &Path, name: &str) -> anyhow::Result<()> {
    let created = MigrationManager::with_dir(dir).create_migration(name)?;
    println!("Created migration files:");
    println!("  {}", created.up_path.display());
    println!("  {}", created.down_path.display());
    Ok(())
}

pub fn validate(dir: &Path) -> anyhow::Result<()> {
    let result = MigrationManager::with_dir(dir).validate_migrations()?;

    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    for error in &result.errors {
        println!("error: {}", error);
    }
    println!(
        "{}/{} migration(s) valid in {}",
        result.valid_count,
        result.total_count,
        dir.display()
    );

    if !result.is_valid() {
        bail!("{} validation error(s)", result.errors.len());
    }
    Ok(())
}

/// Apply pending migrations with the configured engine
pub async fn apply_pending(config: &AppConfig, pool: Arc<dyn DatabasePool>) -> anyhow::Result<()> {
    let manager = migration_manager(config);
    match config.migrations.scheme {
        LedgerScheme::Batch => {
            let result = MigrationRunner::new(manager, pool).run().await?;
            if result.applied_count == 0 {
                println!("Nothing to migrate");
            } else {
                println!(
                    "Applied {} migration(s) in batch {} ({} ms):",
                    result.applied_count,
                    result.batch.unwrap_or_default(),
                    result.execution_time_ms
                );
                for id in &result.applied_migrations {
                    println!("  {}", id);
                }
            }
        }
        LedgerScheme::Versioned => {
            let outcome = VersionController::new(manager, pool).up().await?;
            print_outcome(&outcome);
        }
    }
    Ok(())
}

pub async fn up(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;
    let result = apply_pending(config, pool.clone()).await;
    pool.close().await;
    result
}

pub async fn down(config: &AppConfig) -> anyhow::Result<()> {
    let (engine, pool) = open_engine(config).await?;
    let result = async {
        match engine {
            Engine::Batch(runner) => {
                let result = runner.rollback().await?;
                match result.batch {
                    None => println!("Nothing to roll back"),
                    Some(batch) => {
                        println!(
                            "Rolled back {} migration(s) from batch {}:",
                            result.rolled_back_count, batch
                        );
                        for id in &result.rolled_back_migrations {
                            println!("  {}", id);
                        }
                    }
                }
            }
            Engine::Versioned(controller) => {
                let outcome = controller.rollback_one().await?;
                print_outcome(&outcome);
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    pool.close().await;
    result
}

pub async fn migrate_to(config: &AppConfig, version: u64) -> anyhow::Result<()> {
    if config.migrations.scheme != LedgerScheme::Versioned {
        bail!(
            "migrate-to requires migrations.scheme: versioned (configured: {})",
            config.migrations.scheme
        );
    }

    let pool = connect_database(config).await?;
    let controller = VersionController::new(migration_manager(config), pool.clone());
    let result = controller
        .migrate_to(version)
        .await
        .with_context(|| format!("Failed to migrate to version {}", version));
    pool.close().await;

    print_outcome(&result?);
    Ok(())
}

pub async fn force(config: &AppConfig, version: u64) -> anyhow::Result<()> {
    if config.migrations.scheme != LedgerScheme::Versioned {
        bail!(
            "force requires migrations.scheme: versioned (configured: {})",
            config.migrations.scheme
        );
    }

    let pool = connect_database(config).await?;
    let controller = VersionController::new(migration_manager(config), pool.clone());
    let result = controller.force(version).await;
    pool.close().await;

    println!("Forced. {}", result?);
    Ok(())
}

pub async fn version(config: &AppConfig) -> anyhow::Result<()> {
    let (engine, pool) = open_engine(config).await?;
    let result = async {
        match engine {
            Engine::Versioned(controller) => {
                let status = controller.status().await?;
                println!("{}", status);
            }
            Engine::Batch(runner) => {
                runner.ledger().ensure_table().await?;
                let applied = runner.ledger().list_applied().await?;
                match applied.last() {
                    Some(last) => println!(
                        "Current batch: {} (last migration: {})",
                        last.batch, last.name
                    ),
                    None => println!("No migrations applied"),
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    pool.close().await;
    result
}

pub async fn status(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let (engine, pool) = open_engine(config).await?;
    let result = async {
        match engine {
            Engine::Batch(runner) => {
                let entries = runner.status().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                    return Ok(());
                }

                println!("Migration status ({}):", config.migrations.dir.display());
                if entries.is_empty() {
                    println!("  No migrations found");
                }
                for entry in &entries {
                    match &entry.status {
                        MigrationStatus::Pending => println!("  [pending]  {}", entry.id),
                        MigrationStatus::Applied { batch, applied_at } => println!(
                            "  [applied]  {} (batch {}, {})",
                            entry.id,
                            batch,
                            applied_at.format("%Y-%m-%d %H:%M:%S UTC")
                        ),
                        MigrationStatus::Missing { batch, .. } => println!(
                            "  [missing]  {} (batch {}, file not found)",
                            entry.id, batch
                        ),
                    }
                }
            }
            Engine::Versioned(controller) => {
                let status = controller.status().await?;
                let migrations = controller.manager().load_versioned()?;

                if json {
                    let report = serde_json::json!({
                        "version": status.version,
                        "dirty": status.dirty,
                        "migrations": migrations
                            .iter()
                            .map(|m| serde_json::json!({
                                "version": m.version,
                                "name": m.name,
                                "state": version_state(m.version, &status),
                            }))
                            .collect::<Vec<_>>(),
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    return Ok(());
                }

                println!("{}", status);
                for migration in &migrations {
                    let marker = version_state(migration.version, &status);
                    println!("  [{}]  {}", marker, migration.up_file);
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    pool.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_state_labels() {
        let clean = VersionStatus::clean(Some(1735689600001));
        assert_eq!(version_state(1735689600000, &clean), "applied");
        assert_eq!(version_state(1735689600001, &clean), "applied");
        assert_eq!(version_state(1735689600002, &clean), "pending");

        let dirty = VersionStatus {
            version: Some(1735689600001),
            dirty: true,
        };
        assert_eq!(version_state(1735689600000, &dirty), "applied");
        assert_eq!(version_state(1735689600001, &dirty), "dirty");
        assert_eq!(version_state(1735689600002, &dirty), "pending");

        assert_eq!(version_state(1735689600000, &VersionStatus::default()), "pending");
    }
}
