//! Migration System
//!
//! Two engines share the file store but keep separate ledgers:
//! [`MigrationRunner`] applies and rolls back whole batches, while
//! [`VersionController`] steps a single `(version, dirty)` pointer.

pub mod definitions;
pub mod files;
pub mod ledger;
pub mod rollback;
pub mod runner;
pub mod scaffold;
pub mod validation;
pub mod version;

pub use definitions::*;
pub use files::{down_file_name, parse_filename, MigrationManager, ParsedFilename};
pub use ledger::MigrationLedger;
pub use runner::MigrationRunner;
pub use scaffold::{normalize_name, title_case};
pub use validation::ValidationResult;
pub use version::{VersionController, VersionLedger};
