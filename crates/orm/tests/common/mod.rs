//! Shared fixtures for the migration engine tests

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tenantbase_orm::{
    connect, DatabasePool, DatabasePoolConfig, DatabaseValue, MigrationManager,
};

/// A throw-away SQLite database next to a migrations directory
pub struct TestEnv {
    pub dir: TempDir,
    pub pool: Arc<dyn DatabasePool>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("migrations")).unwrap();

        let url = format!("sqlite://{}", dir.path().join("tenantbase.db").display());
        let pool = connect(&url, DatabasePoolConfig::default().with_max_connections(1))
            .await
            .unwrap();

        Self { dir, pool }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    pub fn manager(&self) -> MigrationManager {
        MigrationManager::with_dir(self.migrations_dir())
    }

    /// Write `<version>_<name>.up.sql` and, when given, its down script
    pub fn write_migration(
        &self,
        version: u64,
        name: &str,
        up: &str,
        down: Option<&str>,
    ) -> String {
        let up_file = format!("{}_{}.up.sql", version, name);
        fs::write(self.migrations_dir().join(&up_file), up).unwrap();
        if let Some(down) = down {
            let down_file = format!("{}_{}.down.sql", version, name);
            fs::write(self.migrations_dir().join(down_file), down).unwrap();
        }
        up_file
    }

    /// `create_<table>` with a matching `DROP TABLE` down script
    pub fn write_table(&self, version: u64, table: &str) -> String {
        let drop = format!("DROP TABLE {};", table);
        self.write_migration(
            version,
            &format!("create_{}", table),
            &create_table_sql(table),
            Some(&drop),
        )
    }

    /// `create_<table>` without a down script
    pub fn write_table_up_only(&self, version: u64, table: &str) -> String {
        self.write_migration(version, &format!("create_{}", table), &create_table_sql(table), None)
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        let rows = self
            .pool
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[DatabaseValue::from(table)],
            )
            .await
            .unwrap();
        !rows.is_empty()
    }
}

pub fn create_table_sql(table: &str) -> String {
    format!("CREATE TABLE {} (id INTEGER PRIMARY KEY);", table)
}
