//! Scaffold Generator - writes timestamped up/down templates
//!
//! Nothing is executed; the files are starting points for a human author.

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::definitions::{CreatedMigration, DOWN_SUFFIX, TIMESTAMP_DIGITS, UP_SUFFIX};
use super::files::MigrationManager;
use crate::error::{MigrationError, MigrationResult};

const MAX_NAME_LENGTH: usize = 100;

impl MigrationManager {
    /// Create a new migration pair stamped with the current time
    pub fn create_migration(&self, name: &str) -> MigrationResult<CreatedMigration> {
        self.create_migration_at(name, Utc::now())
    }

    /// Create a new migration pair stamped with `created_at`
    pub fn create_migration_at(
        &self,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> MigrationResult<CreatedMigration> {
        let name = normalize_name(name)?;

        let millis = created_at.timestamp_millis();
        let version = u64::try_from(millis)
            .ok()
            .filter(|v| v.to_string().len() == TIMESTAMP_DIGITS)
            .ok_or_else(|| {
                MigrationError::Configuration(format!(
                    "Timestamp {} does not fit the {}-digit migration prefix",
                    millis, TIMESTAMP_DIGITS
                ))
            })?;

        let dir = self.migrations_dir();
        fs::create_dir_all(dir)
            .map_err(|e| MigrationError::io("create migrations directory", dir, e))?;

        let title = title_case(&name);
        let created = created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let stem = format!("{:013}_{}", version, name);

        let up_path = dir.join(format!("{}{}", stem, UP_SUFFIX));
        let down_path = dir.join(format!("{}{}", stem, DOWN_SUFFIX));

        write_new_file(&up_path, &up_template(&title, &created))?;
        write_new_file(&down_path, &down_template(&title, &created))?;

        tracing::info!(up = %up_path.display(), down = %down_path.display(), "Created migration");

        Ok(CreatedMigration {
            version,
            up_path,
            down_path,
        })
    }
}

/// Trim, lowercase and turn spaces and hyphens into underscores
pub fn normalize_name(name: &str) -> MigrationResult<String> {
    let normalized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    if normalized.is_empty() || normalized.len() > MAX_NAME_LENGTH {
        return Err(MigrationError::Configuration(format!(
            "Migration name must be between 1 and {} characters",
            MAX_NAME_LENGTH
        )));
    }

    if !normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(MigrationError::Configuration(format!(
            "Migration name '{}' may only contain letters, digits, underscores, spaces and hyphens",
            name.trim()
        )));
    }

    if normalized.starts_with('_') {
        return Err(MigrationError::Configuration(format!(
            "Migration name '{}' must start with a letter or digit",
            name.trim()
        )));
    }

    Ok(normalized)
}

/// `add_users` -> `Add Users`
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_new_file(path: &Path, content: &str) -> MigrationResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| MigrationError::io("create migration file", path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| MigrationError::io("write migration file", path, e))
}

fn up_template(title: &str, created: &str) -> String {
    format!(
        r#"-- Migration: {title} (UP)
-- Created: {created}
-- Description: Add your migration description here

-- Example templates:

-- Create table:
-- CREATE TABLE example_table (
--     id BIGSERIAL PRIMARY KEY,
--     name VARCHAR(255) NOT NULL,
--     email VARCHAR(255) UNIQUE,
--     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
--     updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
-- );

-- Add column:
-- ALTER TABLE users ADD COLUMN phone VARCHAR(20);

-- Create index:
-- CREATE INDEX idx_users_email ON users(email);

-- Your migration SQL here:

"#
    )
}

fn down_template(title: &str, created: &str) -> String {
    format!(
        r#"-- Migration: {title} (DOWN)
-- Created: {created}
-- Description: Rollback for the up migration

-- Example rollback templates:

-- Drop table:
-- DROP TABLE IF EXISTS example_table;

-- Drop column:
-- ALTER TABLE users DROP COLUMN IF EXISTS phone;

-- Drop index:
-- DROP INDEX IF EXISTS idx_users_email;

-- Your rollback SQL here:

"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::definitions::has_executable_sql;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("add_users").unwrap(), "add_users");
        assert_eq!(normalize_name("  Add Users ").unwrap(), "add_users");
        assert_eq!(normalize_name("add-tenant-index").unwrap(), "add_tenant_index");
        assert!(normalize_name("").is_err());
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name("drop;table").is_err());
        assert!(normalize_name("_leading").is_err());
        assert!(normalize_name(&"a".repeat(101)).is_err());
        assert!(normalize_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("add_users"), "Add Users");
        assert_eq!(title_case("create_tenancy_schema"), "Create Tenancy Schema");
        assert_eq!(title_case("v2_api"), "V2 Api");
    }

    #[test]
    fn test_create_migration_pair() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_dir(dir.path().join("migrations"));
        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let created = manager.create_migration_at("add_users", created_at).unwrap();

        assert_eq!(created.version, 1735689600000);
        assert_eq!(
            created.up_path.file_name().unwrap(),
            "1735689600000_add_users.up.sql"
        );
        assert_eq!(
            created.down_path.file_name().unwrap(),
            "1735689600000_add_users.down.sql"
        );

        let up = fs::read_to_string(&created.up_path).unwrap();
        let down = fs::read_to_string(&created.down_path).unwrap();
        assert!(up.starts_with("-- Migration: Add Users (UP)\n"));
        assert!(up.contains("-- Created: 2025-01-01 00:00:00 UTC"));
        assert!(down.starts_with("-- Migration: Add Users (DOWN)\n"));
        assert!(!has_executable_sql(&up));
        assert!(!has_executable_sql(&down));
    }

    #[test]
    fn test_create_migration_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_dir(dir.path());
        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        manager.create_migration_at("add_users", created_at).unwrap();
        let err = manager.create_migration_at("add_users", created_at).unwrap_err();
        assert!(matches!(err, MigrationError::FileIo { .. }));
    }

    #[test]
    fn test_created_files_are_listed() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_dir(dir.path());
        let created = manager.create_migration("add_users").unwrap();

        let ids = manager.list_migrations().unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0], format!("{:013}_add_users.up.sql", created.version));
    }
}
