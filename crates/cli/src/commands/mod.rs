pub mod migrate;
pub mod serve;

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tenantbase_core::{AppConfig, ConfigError};
use tenantbase_orm::backends::redact_url;
use tenantbase_orm::{connect, DatabasePool, DatabasePoolConfig, MigrationConfig, MigrationManager};

/// Load, override and validate the configuration file
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Migrations directory for commands that never open a connection.
///
/// An explicit `--dir` wins, then `migrations.dir` from the config file. A
/// missing config file falls back to `MIGRATIONS_DIR` or `migrations`.
pub fn resolve_migrations_dir(config_path: &Path, dir: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = dir {
        return Ok(dir);
    }

    match AppConfig::from_file(config_path) {
        Ok(mut config) => {
            config.apply_env_overrides()?;
            Ok(config.migrations.dir)
        }
        Err(ConfigError::FileSystem { .. }) if !config_path.exists() => {
            let mut config = AppConfig::default();
            config.apply_env_overrides()?;
            Ok(config.migrations.dir)
        }
        Err(e) => Err(e).with_context(|| {
            format!("Failed to load configuration from {}", config_path.display())
        }),
    }
}

pub fn migration_manager(config: &AppConfig) -> MigrationManager {
    MigrationManager::with_config(MigrationConfig {
        migrations_dir: config.migrations.dir.clone(),
        migrations_table: config.migrations.table.clone(),
        versions_table: config.migrations.versions_table.clone(),
    })
}

pub async fn connect_database(config: &AppConfig) -> anyhow::Result<Arc<dyn DatabasePool>> {
    let url = config.database_url()?;
    let pool_config =
        DatabasePoolConfig::default().with_max_connections(config.database.max_connections);

    tracing::info!(url = %redact_url(&url), "Connecting to database");
    connect(&url, pool_config)
        .await
        .with_context(|| format!("Failed to connect to database at {}", redact_url(&url)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_dir_wins() {
        let dir = resolve_migrations_dir(
            Path::new("does/not/exist.yaml"),
            Some(PathBuf::from("db/migrations")),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("db/migrations"));
    }

    #[test]
    fn test_dir_from_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "migrations:\n  dir: sql/migrations\n").unwrap();

        let dir = resolve_migrations_dir(&path, None).unwrap();
        if std::env::var("MIGRATIONS_DIR").is_err() {
            assert_eq!(dir, PathBuf::from("sql/migrations"));
        }
    }

    #[test]
    fn test_broken_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "server: [unclosed").unwrap();

        assert!(resolve_migrations_dir(&path, None).is_err());
    }
}
