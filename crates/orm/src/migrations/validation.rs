//! Migration Validation - static checks over the migrations directory
//!
//! Nothing touches the database. Errors make a directory unfit to run;
//! warnings point at scripts worth a second look.

use serde::Serialize;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::{HashMap, HashSet};

use super::definitions::{has_executable_sql, DOWN_SUFFIX, UP_SUFFIX};
use super::files::{down_file_name, parse_filename, MigrationManager};
use crate::error::MigrationResult;

const DESTRUCTIVE_PATTERNS: [(&str, &str); 4] = [
    ("DROP TABLE", "drops a table"),
    ("DROP DATABASE", "drops a database"),
    ("TRUNCATE", "truncates a table"),
    ("DELETE FROM", "deletes rows"),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub total_count: usize,
    pub valid_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl MigrationManager {
    /// Check naming, pairing and content of every migration file
    pub fn validate_migrations(&self) -> MigrationResult<ValidationResult> {
        let file_names = self.file_names()?;
        let ups = self.list_migrations()?;

        let mut version_count: HashMap<u64, usize> = HashMap::new();
        for id in &ups {
            if let Some(parsed) = parse_filename(id) {
                *version_count.entry(parsed.version).or_insert(0) += 1;
            }
        }

        let mut result = ValidationResult {
            total_count: ups.len(),
            ..ValidationResult::default()
        };

        for id in &ups {
            let mut has_errors = false;

            match parse_filename(id) {
                Some(parsed) => {
                    if version_count.get(&parsed.version).copied().unwrap_or(0) > 1 {
                        result.errors.push(format!(
                            "{}: version {} is used by more than one migration",
                            id, parsed.version
                        ));
                        has_errors = true;
                    }
                }
                None => {
                    result.errors.push(format!(
                        "{}: name does not follow <13-digit timestamp>_<name>{}",
                        id, UP_SUFFIX
                    ));
                    has_errors = true;
                }
            }

            if !self.has_down_file(id) {
                result
                    .errors
                    .push(format!("{}: down migration {} not found", id, down_file_name(id)));
                has_errors = true;
            }

            let sql = self.read_sql(id)?;
            if !has_executable_sql(&sql) {
                result.errors.push(format!("{}: up migration contains no SQL", id));
                has_errors = true;
            } else {
                result.warnings.extend(inspect_sql(id, &sql));
            }

            if !has_errors {
                result.valid_count += 1;
            }
        }

        let up_set: HashSet<&str> = ups.iter().map(String::as_str).collect();
        for name in file_names.iter().filter(|n| n.ends_with(DOWN_SUFFIX)) {
            let stem = &name[..name.len() - DOWN_SUFFIX.len()];
            if !up_set.contains(format!("{}{}", stem, UP_SUFFIX).as_str()) {
                result
                    .warnings
                    .push(format!("{}: down migration has no matching up migration", name));
            }
        }

        Ok(result)
    }
}

/// Parser and destructive-statement warnings for one up script
fn inspect_sql(id: &str, sql: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Err(e) = Parser::parse_sql(&PostgreSqlDialect {}, sql) {
        warnings.push(format!("{}: SQL could not be parsed as PostgreSQL: {}", id, e));
    }

    let executable = strip_comments(sql).to_uppercase();
    for (pattern, description) in DESTRUCTIVE_PATTERNS {
        if executable.contains(pattern) {
            warnings.push(format!("{}: up migration {} ({})", id, description, pattern));
        }
    }

    warnings
}

fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map_or("", |i| &after[i..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |i| &after[i + 2..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_valid_directory() {
        let dir = TempDir::new().unwrap();
        touch(
            &dir,
            "1735689600000_create_users.up.sql",
            "CREATE TABLE users (id BIGINT PRIMARY KEY);",
        );
        touch(&dir, "1735689600000_create_users.down.sql", "DROP TABLE users;");

        let result = MigrationManager::with_dir(dir.path()).validate_migrations().unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert_eq!(result.total_count, 1);
        assert_eq!(result.valid_count, 1);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_reports_errors() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "init.up.sql", "CREATE TABLE a (id INT);");
        touch(&dir, "init.down.sql", "DROP TABLE a;");
        touch(&dir, "1735689600000_empty.up.sql", "-- nothing yet\n");
        touch(&dir, "1735689600000_empty.down.sql", "");
        touch(&dir, "1735689600001_no_down.up.sql", "CREATE TABLE b (id INT);");

        let result = MigrationManager::with_dir(dir.path()).validate_migrations().unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.total_count, 3);
        assert_eq!(result.valid_count, 0);
        assert!(result.errors.iter().any(|e| e.starts_with("init.up.sql: name")));
        assert!(result.errors.iter().any(|e| e.contains("contains no SQL")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("1735689600001_no_down.down.sql not found")));
    }

    #[test]
    fn test_duplicate_versions() {
        let dir = TempDir::new().unwrap();
        for name in ["1735689600000_a", "1735689600000_b"] {
            touch(&dir, &format!("{}.up.sql", name), "SELECT 1;");
            touch(&dir, &format!("{}.down.sql", name), "SELECT 1;");
        }

        let result = MigrationManager::with_dir(dir.path()).validate_migrations().unwrap();
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.contains("more than one migration")));
    }

    #[test]
    fn test_warnings() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "1735689600000_purge.up.sql", "-- DROP TABLE ignored\nTRUNCATE audit_logs;");
        touch(&dir, "1735689600000_purge.down.sql", "");
        touch(&dir, "1735689600001_broken.up.sql", "CREATE TABEL users (id INT);");
        touch(&dir, "1735689600001_broken.down.sql", "");
        touch(&dir, "1735689600009_orphan.down.sql", "");

        let result = MigrationManager::with_dir(dir.path()).validate_migrations().unwrap();
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.iter().any(|w| w.contains("TRUNCATE")));
        assert!(!result.warnings.iter().any(|w| w.contains("(DROP TABLE)")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("1735689600001_broken.up.sql: SQL could not be parsed")));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("1735689600009_orphan.down.sql")));
    }
}
