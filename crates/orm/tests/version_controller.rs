mod common;

use common::TestEnv;
use tenantbase_orm::{MigrateOutcome, MigrationError, VersionController, VersionStatus};

const USERS: u64 = 1735689600000;
const TENANTS: u64 = 1735689600001;
const JOBS: u64 = 1735689600002;

fn controller(env: &TestEnv) -> VersionController {
    VersionController::new(env.manager(), env.pool.clone())
}

fn seed(env: &TestEnv) {
    env.write_table(USERS, "users");
    env.write_table(TENANTS, "tenants");
    env.write_table(JOBS, "jobs");
}

#[tokio::test]
async fn test_fresh_database_is_clean_and_nil() {
    let env = TestEnv::new().await;
    let status = controller(&env).status().await.unwrap();
    assert_eq!(status, VersionStatus::default());
    assert_eq!(status.to_string(), "Current version: 0 (status: clean)");
}

#[tokio::test]
async fn test_up_applies_everything() {
    let env = TestEnv::new().await;
    seed(&env);

    let outcome = controller(&env).up().await.unwrap();
    assert_eq!(
        outcome,
        MigrateOutcome::Migrated {
            from: None,
            to: Some(JOBS),
            steps: 3
        }
    );
    assert!(env.table_exists("users").await);
    assert!(env.table_exists("jobs").await);
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::clean(Some(JOBS)));
}

#[tokio::test]
async fn test_migrate_to_current_version_is_no_change() {
    let env = TestEnv::new().await;
    seed(&env);
    controller(&env).migrate_to(TENANTS).await.unwrap();

    let outcome = controller(&env).migrate_to(TENANTS).await.unwrap();
    assert_eq!(outcome, MigrateOutcome::NoChange { version: Some(TENANTS) });
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::clean(Some(TENANTS)));
    assert!(!env.table_exists("jobs").await);
}

#[tokio::test]
async fn test_migrate_down_and_to_zero() {
    let env = TestEnv::new().await;
    seed(&env);
    controller(&env).up().await.unwrap();

    let outcome = controller(&env).migrate_to(USERS).await.unwrap();
    assert_eq!(
        outcome,
        MigrateOutcome::Migrated {
            from: Some(JOBS),
            to: Some(USERS),
            steps: 2
        }
    );
    assert!(env.table_exists("users").await);
    assert!(!env.table_exists("tenants").await);
    assert!(!env.table_exists("jobs").await);

    controller(&env).migrate_to(0).await.unwrap();
    assert!(!env.table_exists("users").await);
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::default());
}

#[tokio::test]
async fn test_unknown_target_version() {
    let env = TestEnv::new().await;
    seed(&env);
    let err = controller(&env).migrate_to(42).await.unwrap_err();
    assert!(matches!(err, MigrationError::UnknownVersion(42)));
}

#[tokio::test]
async fn test_rollback_one() {
    let env = TestEnv::new().await;
    seed(&env);

    let outcome = controller(&env).rollback_one().await.unwrap();
    assert_eq!(outcome, MigrateOutcome::NoChange { version: None });

    controller(&env).up().await.unwrap();
    controller(&env).rollback_one().await.unwrap();
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::clean(Some(TENANTS)));
    assert!(!env.table_exists("jobs").await);
    assert!(env.table_exists("tenants").await);

    controller(&env).rollback_one().await.unwrap();
    controller(&env).rollback_one().await.unwrap();
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::default());
    assert!(!env.table_exists("users").await);
}

#[tokio::test]
async fn test_failed_step_leaves_dirty_until_forced() {
    let env = TestEnv::new().await;
    env.write_table(USERS, "users");
    env.write_migration(
        TENANTS,
        "broken",
        "CREATE TABLE tenants (id INTEGER PRIMARY KEY);\nINSERT INTO nowhere VALUES (1);",
        Some("DROP TABLE IF EXISTS tenants;"),
    );

    let err = controller(&env).up().await.unwrap_err();
    assert!(matches!(err, MigrationError::Execution { ref migration, .. }
        if migration == "1735689600001_broken.up.sql"));

    let status = controller(&env).status().await.unwrap();
    assert_eq!(
        status,
        VersionStatus {
            version: Some(TENANTS),
            dirty: true
        }
    );
    assert!(env.table_exists("users").await);

    for result in [
        controller(&env).up().await,
        controller(&env).migrate_to(USERS).await,
        controller(&env).rollback_one().await,
    ] {
        assert!(matches!(result, Err(MigrationError::Dirty(Some(TENANTS)))));
    }

    let forced = controller(&env).force(USERS).await.unwrap();
    assert_eq!(forced, VersionStatus::clean(Some(USERS)));

    std::fs::write(
        env.migrations_dir().join("1735689600001_broken.up.sql"),
        "CREATE TABLE IF NOT EXISTS tenants (id INTEGER PRIMARY KEY);",
    )
    .unwrap();
    controller(&env).up().await.unwrap();
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::clean(Some(TENANTS)));
}

#[tokio::test]
async fn test_force_validates_version() {
    let env = TestEnv::new().await;
    seed(&env);
    assert!(matches!(
        controller(&env).force(7).await,
        Err(MigrationError::UnknownVersion(7))
    ));
    assert_eq!(controller(&env).force(0).await.unwrap(), VersionStatus::default());
}

#[tokio::test]
async fn test_missing_down_checked_before_any_step() {
    let env = TestEnv::new().await;
    env.write_table_up_only(USERS, "users");
    env.write_table(TENANTS, "tenants");
    controller(&env).up().await.unwrap();

    let err = controller(&env).migrate_to(0).await.unwrap_err();
    assert!(matches!(err, MigrationError::MissingDownMigration(_)));
    assert!(env.table_exists("tenants").await);
    assert_eq!(controller(&env).status().await.unwrap(), VersionStatus::clean(Some(TENANTS)));
}
