//! Migration Definitions - Core types shared by the migration engine
//!
//! File-level types (`MigrationFile`, `Migration`), ledger rows, operation
//! results and the engine configuration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Suffix of forward scripts; only these are listed as migrations
pub const UP_SUFFIX: &str = ".up.sql";

/// Suffix of reverse scripts, located by substituting [`UP_SUFFIX`]
pub const DOWN_SUFFIX: &str = ".down.sql";

/// Width of the millisecond timestamp prefix. Fixed so that lexicographic
/// order equals chronological order.
pub const TIMESTAMP_DIGITS: usize = 13;

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration (run the up script)
    Up,
    /// Revert the migration (run the down script)
    Down,
}

impl MigrationDirection {
    pub fn suffix(&self) -> &'static str {
        match self {
            MigrationDirection::Up => UP_SUFFIX,
            MigrationDirection::Down => DOWN_SUFFIX,
        }
    }
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// A single script read from the migrations directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Filename, the identity of the migration
    pub id: String,
    /// Timestamp prefix used for ordering
    pub sort_key: String,
    /// Human part of the filename, without prefix and suffix
    pub name: String,
    pub direction: MigrationDirection,
    /// Raw SQL, executed verbatim
    pub sql: String,
}

/// An up/down pair keyed by its numeric version (timestamp prefix)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    pub version: u64,
    pub name: String,
    pub up_file: String,
    pub down_file: Option<String>,
}

/// One row of the batch ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Surrogate key, increases with insertion order
    pub id: i64,
    /// Identifier of the applied migration (its up filename)
    pub name: String,
    pub batch: i64,
    pub applied_at: DateTime<Utc>,
}

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Ledger table of the batch scheme
    pub migrations_table: String,
    /// Version pointer table of the versioned scheme
    pub versions_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "tenantbase_migrations".to_string(),
            versions_table: "schema_migrations".to_string(),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunResult {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// IDs of migrations that were applied, in application order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Batch shared by the applied migrations; `None` when nothing ran
    pub batch: Option<i64>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Serialize)]
pub struct RollbackResult {
    /// Number of migrations that were rolled back
    pub rolled_back_count: usize,
    /// IDs of migrations that were rolled back, in reverse application order
    pub rolled_back_migrations: Vec<String>,
    pub batch: Option<i64>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        batch: i64,
        applied_at: DateTime<Utc>,
    },
    /// Recorded in the ledger but the file is gone
    Missing {
        batch: i64,
        applied_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatusEntry {
    pub id: String,
    #[serde(flatten)]
    pub status: MigrationStatus,
}

/// Version pointer of the versioned scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VersionStatus {
    /// `None` when nothing has been applied
    pub version: Option<u64>,
    pub dirty: bool,
}

impl VersionStatus {
    pub fn clean(version: Option<u64>) -> Self {
        Self {
            version,
            dirty: false,
        }
    }

    pub fn state_label(&self) -> &'static str {
        if self.dirty {
            "dirty"
        } else {
            "clean"
        }
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Current version: {} (status: {})",
            self.version.unwrap_or(0),
            self.state_label()
        )
    }
}

/// Outcome of a version controller operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrateOutcome {
    /// Already at the requested version
    NoChange { version: Option<u64> },
    Migrated {
        from: Option<u64>,
        to: Option<u64>,
        steps: usize,
    },
}

/// Migration identifier paired with the path it was written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedMigration {
    pub version: u64,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// False when the script holds nothing but comments, whitespace and semicolons
pub fn has_executable_sql(sql: &str) -> bool {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return false;
        }
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i + 1..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            match after.find("*/") {
                Some(end) => rest = &after[end + 2..],
                // Unterminated comment; let the database reject it
                None => return true,
            }
        } else if let Some(after) = rest.strip_prefix(';') {
            rest = after;
        } else {
            return true;
        }
    }
}
