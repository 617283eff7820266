//! Integration tests running the engine over migration files on disk.
//!
//! Each test writes a migrations directory and a DuckDB database file into a
//! temporary directory, then drives the engine the way the CLI does.

use keel_core::{DatabaseUrl, DirectorySource, SchemaVersion, VersionRecord};
use keel_db::{connect, Backend, DuckDbBackend, StoreOptions};
use keel_migrate::{MigrateError, MigrationOutcome, Migrator, MigratorConfig};
use keel_sql::DuckDbDialect;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

// ── Helpers ────────────────────────────────────────────────────────────

fn write(dir: &Path, name: &str, sql: &str) {
    std::fs::write(dir.join(name), sql).unwrap();
}

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let migrations = temp.path().join("migrations");
    std::fs::create_dir(&migrations).unwrap();

    write(
        &migrations,
        "1_create_users.up.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR);\n",
    );
    write(&migrations, "1_create_users.down.sql", "DROP TABLE users;\n");
    write(
        &migrations,
        "2_create_orders.up.sql",
        "-- orders reference users\n\
         CREATE TABLE orders (id INTEGER, user_id INTEGER);\n\
         INSERT INTO users VALUES (1, 'semi;colon');\n",
    );
    write(&migrations, "2_create_orders.down.sql", "DROP TABLE orders;\n");
    write(
        &migrations,
        "3_add_email.up.sql",
        "ALTER TABLE users ADD COLUMN email VARCHAR;",
    );
    write(&migrations, "README.md", "not a migration");
    temp
}

async fn migrator(root: &Path, config: MigratorConfig) -> Migrator {
    let url = DatabaseUrl::parse(&format!(
        "duckdb://{}",
        root.join("app.duckdb").display()
    ))
    .unwrap();
    let backend = connect(&url, StoreOptions::default()).await.unwrap();
    let source = DirectorySource::new(root.join("migrations"))
        .with_dialect(Box::new(DuckDbDialect::new()));
    Migrator::new(backend, Arc::new(source), config)
}

fn v(n: u64) -> SchemaVersion {
    SchemaVersion::new(n)
}

// ── Tests ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_up_from_directory() {
    let temp = project();
    let migrator = migrator(temp.path(), MigratorConfig::default()).await;

    let outcome = migrator.up(None).await.unwrap();

    assert_eq!(
        outcome,
        MigrationOutcome::Migrated {
            from: v(0),
            to: v(3),
            applied: vec![v(1), v(2), v(3)],
        }
    );
    let report = migrator
        .verify(&["users".to_string(), "orders".to_string()])
        .await
        .unwrap();
    assert!(report.all_present());
}

#[tokio::test]
async fn test_state_persists_across_runs() {
    let temp = project();
    {
        let first = migrator(temp.path(), MigratorConfig::default()).await;
        first.up(Some(v(2))).await.unwrap();
    }

    let second = migrator(temp.path(), MigratorConfig::default()).await;
    assert_eq!(
        second.current_version().await.unwrap(),
        VersionRecord::clean(v(2))
    );
    let outcome = second.up(None).await.unwrap();
    assert_eq!(outcome.final_version(), v(3));
    assert!(second.up(None).await.unwrap().is_no_change());
}

#[tokio::test]
async fn test_new_file_is_picked_up() {
    let temp = project();
    let migrator = migrator(temp.path(), MigratorConfig::default()).await;
    migrator.up(None).await.unwrap();

    write(
        &temp.path().join("migrations"),
        "4_create_items.up.sql",
        "CREATE TABLE items (id INTEGER);",
    );

    let outcome = migrator.up(None).await.unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::Migrated {
            from: v(3),
            to: v(4),
            applied: vec![v(4)],
        }
    );
}

#[tokio::test]
async fn test_down_stops_at_unit_without_down_file() {
    let temp = project();
    let migrator = migrator(temp.path(), MigratorConfig::default()).await;
    migrator.up(None).await.unwrap();

    let err = migrator.down(v(0)).await.unwrap_err();
    assert!(matches!(err, MigrateError::MissingDown { version } if version == v(3)));

    migrator.force(v(2)).await.unwrap();
    let outcome = migrator.down(v(0)).await.unwrap();
    assert_eq!(outcome.final_version(), v(0));
    assert_eq!(
        migrator.current_version().await.unwrap(),
        VersionRecord::EMPTY
    );
}

#[tokio::test]
async fn test_failed_file_leaves_dirty_until_forced() {
    let temp = project();
    write(
        &temp.path().join("migrations"),
        "4_broken.up.sql",
        "CREATE TABLE fine (id INTEGER);\nSELECT * FROM no_such_table;\n",
    );
    let migrator = migrator(temp.path(), MigratorConfig::default()).await;

    let err = migrator.up(None).await.unwrap_err();
    assert!(matches!(err, MigrateError::MigrationFailed { version, .. } if version == v(4)));
    assert_eq!(
        migrator.current_version().await.unwrap(),
        VersionRecord::dirty(v(4))
    );

    let err = migrator.up(None).await.unwrap_err();
    assert!(matches!(err, MigrateError::DirtyState { .. }));

    migrator.force(v(3)).await.unwrap();
    std::fs::remove_file(temp.path().join("migrations/4_broken.up.sql")).unwrap();
    assert!(migrator.up(None).await.unwrap().is_no_change());
}

#[tokio::test]
async fn test_invalid_directory_fails_before_database_changes() {
    let temp = project();
    write(
        &temp.path().join("migrations"),
        "2_duplicate.up.sql",
        "SELECT 1;",
    );
    let migrator = migrator(temp.path(), MigratorConfig::default()).await;

    let err = migrator.up(None).await.unwrap_err();

    assert!(matches!(err, MigrateError::Source(_)));
    assert_eq!(
        migrator.current_version().await.unwrap(),
        VersionRecord::EMPTY
    );
}

#[tokio::test]
async fn test_prod_defers() {
    let temp = project();
    let config = MigratorConfig {
        prod: true,
        ..MigratorConfig::default()
    };
    let migrator = migrator(temp.path(), config).await;

    let outcome = migrator.up(None).await.unwrap();

    assert_eq!(outcome, MigrationOutcome::Deferred { version: v(0) });
    let report = migrator.verify(&["users".to_string()]).await.unwrap();
    assert!(!report.all_present());
}

#[test]
fn test_concurrent_up_has_one_winner() {
    for round in 0..3 {
        let temp = TempDir::new().unwrap();
        let migrations = temp.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        write(
            &migrations,
            "1_fill.up.sql",
            "CREATE TABLE filler AS SELECT range AS id FROM range(3000000);",
        );

        let first = DuckDbBackend::from_path(&temp.path().join("app.duckdb")).unwrap();
        let second = first.try_clone().unwrap();
        let barrier = std::sync::Barrier::new(2);

        let results: Vec<Result<MigrationOutcome, MigrateError>> = std::thread::scope(|scope| {
            let racers: Vec<_> = [first, second]
                .into_iter()
                .map(|db| {
                    let barrier = &barrier;
                    let migrations = migrations.clone();
                    scope.spawn(move || {
                        let runtime = tokio::runtime::Builder::new_current_thread()
                            .build()
                            .unwrap();
                        let source = DirectorySource::new(migrations)
                            .with_dialect(Box::new(DuckDbDialect::new()));
                        let migrator = Migrator::new(
                            Backend::from_shared(Arc::new(db)),
                            Arc::new(source),
                            MigratorConfig::default(),
                        );
                        barrier.wait();
                        runtime.block_on(migrator.up(None))
                    })
                })
                .collect();
            racers.into_iter().map(|r| r.join().unwrap()).collect()
        });

        let migrated = results
            .iter()
            .filter(|r| matches!(r, Ok(MigrationOutcome::Migrated { .. })))
            .count();
        let busy = results
            .iter()
            .filter(|r| matches!(r, Err(MigrateError::LockBusy { .. })))
            .count();
        assert_eq!((migrated, busy), (1, 1), "round {round}: {results:?}");
    }
}
