//! Migration File Store - File system operations for migrations
//!
//! Lists up scripts in the migrations directory, reads them, and pairs up
//! and down scripts by version for the versioned controller.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::definitions::{
    Migration, MigrationConfig, MigrationDirection, MigrationFile, DOWN_SUFFIX, UP_SUFFIX,
};
use crate::error::{MigrationError, MigrationResult};

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{13})_([A-Za-z0-9][A-Za-z0-9_]*)\.(up|down)\.sql$")
        .expect("migration filename regex")
});

/// Components of a conforming migration filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub version: u64,
    pub name: String,
    pub direction: MigrationDirection,
}

/// Parse `<13-digit timestamp>_<name>.(up|down).sql`
pub fn parse_filename(filename: &str) -> Option<ParsedFilename> {
    let captures = FILENAME_PATTERN.captures(filename)?;
    let version = captures.get(1)?.as_str().parse().ok()?;
    let name = captures.get(2)?.as_str().to_string();
    let direction = match captures.get(3)?.as_str() {
        "up" => MigrationDirection::Up,
        _ => MigrationDirection::Down,
    };
    Some(ParsedFilename {
        version,
        name,
        direction,
    })
}

/// Name of the down script paired with an up script
pub fn down_file_name(up_file: &str) -> String {
    match up_file.strip_suffix(UP_SUFFIX) {
        Some(stem) => format!("{}{}", stem, DOWN_SUFFIX),
        None => format!("{}{}", up_file, DOWN_SUFFIX),
    }
}

/// Name, up file and down file collected for one version
type VersionFiles = (String, Option<String>, Option<String>);

/// Migration manager for listing and loading migration files
#[derive(Debug, Clone, Default)]
pub struct MigrationManager {
    config: MigrationConfig,
}

impl MigrationManager {
    /// Create a new migration manager with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new migration manager with custom configuration
    pub fn with_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Default configuration pointed at another directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self::with_config(MigrationConfig {
            migrations_dir: dir.as_ref().to_path_buf(),
            ..MigrationConfig::default()
        })
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.config.migrations_dir
    }

    /// Every up script in the directory, sorted ascending by filename.
    ///
    /// Non-conforming names are still returned; each one is logged because
    /// their position in the order is not guaranteed to be chronological.
    pub fn list_migrations(&self) -> MigrationResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .file_names()?
            .into_iter()
            .filter(|name| name.ends_with(UP_SUFFIX))
            .collect();

        for id in &ids {
            if parse_filename(id).is_none() {
                tracing::warn!(
                    migration = %id,
                    "Migration filename does not follow <13-digit timestamp>_<name>.up.sql; \
                     ordering may not be chronological"
                );
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Read one script by filename
    pub fn read_migration(&self, id: &str) -> MigrationResult<MigrationFile> {
        let sql = self.read_sql(id)?;

        let (sort_key, name, direction) = match parse_filename(id) {
            Some(parsed) => (
                format!("{:013}", parsed.version),
                parsed.name,
                parsed.direction,
            ),
            None => {
                let direction = if id.ends_with(DOWN_SUFFIX) {
                    MigrationDirection::Down
                } else {
                    MigrationDirection::Up
                };
                let stem = id.strip_suffix(direction.suffix()).unwrap_or(id);
                let (prefix, name) = stem.split_once('_').unwrap_or((stem, stem));
                (prefix.to_string(), name.to_string(), direction)
            }
        };

        Ok(MigrationFile {
            id: id.to_string(),
            sort_key,
            name,
            direction,
            sql,
        })
    }

    /// Raw SQL text of a script
    pub fn read_sql(&self, file_name: &str) -> MigrationResult<String> {
        let path = self.config.migrations_dir.join(file_name);
        fs::read_to_string(&path).map_err(|e| MigrationError::io("read migration file", &path, e))
    }

    /// Whether the down script of `up_file` exists on disk
    pub fn has_down_file(&self, up_file: &str) -> bool {
        self.config.migrations_dir.join(down_file_name(up_file)).is_file()
    }

    /// Up/down pairs keyed by version, ascending.
    ///
    /// Every `.up.sql`/`.down.sql` file must conform to the naming scheme and
    /// versions must be unique.
    pub fn load_versioned(&self) -> MigrationResult<Vec<Migration>> {
        let mut by_version: BTreeMap<u64, VersionFiles> = BTreeMap::new();

        for file_name in self.file_names()? {
            if !file_name.ends_with(UP_SUFFIX) && !file_name.ends_with(DOWN_SUFFIX) {
                continue;
            }
            let parsed = parse_filename(&file_name)
                .ok_or_else(|| MigrationError::InvalidFilename(file_name.clone()))?;

            let entry = by_version
                .entry(parsed.version)
                .or_insert_with(|| (parsed.name.clone(), None, None));
            if entry.0 != parsed.name {
                return Err(MigrationError::DuplicateVersion(parsed.version));
            }

            let slot = match parsed.direction {
                MigrationDirection::Up => &mut entry.1,
                MigrationDirection::Down => &mut entry.2,
            };
            if slot.is_some() {
                return Err(MigrationError::DuplicateVersion(parsed.version));
            }
            *slot = Some(file_name);
        }

        let mut migrations = Vec::with_capacity(by_version.len());
        for (version, (name, up_file, down_file)) in by_version {
            match up_file {
                Some(up_file) => migrations.push(Migration {
                    version,
                    name,
                    up_file,
                    down_file,
                }),
                None => {
                    tracing::warn!(
                        version,
                        name = %name,
                        "Down migration has no matching up migration; ignoring"
                    );
                }
            }
        }

        Ok(migrations)
    }

    pub(crate) fn file_names(&self) -> MigrationResult<Vec<String>> {
        let dir = &self.config.migrations_dir;
        let entries =
            fs::read_dir(dir).map_err(|e| MigrationError::io("read migrations directory", dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::io("read migrations directory", dir, e))?;
            let file_type = entry
                .file_type()
                .map_err(|e| MigrationError::io("inspect", entry.path(), e))?;
            if file_type.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => {
                    tracing::warn!(file = ?name, "Skipping migration file with a non UTF-8 name");
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_parse_filename() {
        let parsed = parse_filename("1735689600000_create_users.up.sql").unwrap();
        assert_eq!(parsed.version, 1735689600000);
        assert_eq!(parsed.name, "create_users");
        assert_eq!(parsed.direction, MigrationDirection::Up);

        let parsed = parse_filename("1735689600000_AddIndex.down.sql").unwrap();
        assert_eq!(parsed.direction, MigrationDirection::Down);

        assert!(parse_filename("173568960000_short.up.sql").is_none());
        assert!(parse_filename("1735689600000_.up.sql").is_none());
        assert!(parse_filename("1735689600000_users.sql").is_none());
        assert!(parse_filename("1735689600000_bad-name.up.sql").is_none());
    }

    #[test]
    fn test_down_file_name() {
        assert_eq!(
            down_file_name("1735689600000_create_users.up.sql"),
            "1735689600000_create_users.down.sql"
        );
    }

    #[test]
    fn test_list_only_up_files_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "1735689600002_c.up.sql", "");
        touch(&dir, "1735689600000_a.up.sql", "");
        touch(&dir, "1735689600000_a.down.sql", "");
        touch(&dir, "1735689600001_b.up.sql", "");
        touch(&dir, "README.md", "");
        touch(&dir, "notes.sql", "");
        fs::create_dir(dir.path().join("1735689600003_dir.up.sql")).unwrap();

        let manager = MigrationManager::with_dir(dir.path());
        let ids = manager.list_migrations().unwrap();
        assert_eq!(
            ids,
            vec![
                "1735689600000_a.up.sql",
                "1735689600001_b.up.sql",
                "1735689600002_c.up.sql"
            ]
        );
    }

    #[test]
    fn test_list_keeps_nonconforming_up_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "1735689600000_a.up.sql", "");
        touch(&dir, "init.up.sql", "");

        let ids = MigrationManager::with_dir(dir.path()).list_migrations().unwrap();
        assert_eq!(ids, vec!["1735689600000_a.up.sql", "init.up.sql"]);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_dir(dir.path().join("absent"));
        let err = manager.list_migrations().unwrap_err();
        assert!(matches!(err, MigrationError::FileIo { .. }));
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn test_read_migration() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "1735689600000_create_users.up.sql", "CREATE TABLE users (id INT);");

        let file = MigrationManager::with_dir(dir.path())
            .read_migration("1735689600000_create_users.up.sql")
            .unwrap();
        assert_eq!(file.sort_key, "1735689600000");
        assert_eq!(file.name, "create_users");
        assert_eq!(file.direction, MigrationDirection::Up);
        assert_eq!(file.sql, "CREATE TABLE users (id INT);");
    }

    #[test]
    fn test_load_versioned_pairs_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "1735689600000_a.up.sql", "");
        touch(&dir, "1735689600000_a.down.sql", "");
        touch(&dir, "1735689600001_b.up.sql", "");

        let migrations = MigrationManager::with_dir(dir.path()).load_versioned().unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1735689600000);
        assert_eq!(migrations[0].down_file.as_deref(), Some("1735689600000_a.down.sql"));
        assert_eq!(migrations[1].down_file, None);
    }

    #[test]
    fn test_load_versioned_rejects_bad_names_and_duplicates() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "init.up.sql", "");
        let err = MigrationManager::with_dir(dir.path()).load_versioned().unwrap_err();
        assert!(matches!(err, MigrationError::InvalidFilename(ref f) if f == "init.up.sql"));

        let dir = TempDir::new().unwrap();
        touch(&dir, "1735689600000_a.up.sql", "");
        touch(&dir, "1735689600000_b.up.sql", "");
        let err = MigrationManager::with_dir(dir.path()).load_versioned().unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateVersion(1735689600000)));
    }
}
