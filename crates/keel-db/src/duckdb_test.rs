use super::*;
use keel_core::SchemaVersion;
use tempfile::tempdir;

fn stmts(sql: &[&str]) -> Vec<String> {
    sql.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_in_memory() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert_eq!(db.db_type(), "duckdb");
    assert!(db.supports_transactional_ddl());
}

#[tokio::test]
async fn test_execute_statements() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute(
        &stmts(&["CREATE TABLE t1 (id INT)", "CREATE TABLE t2 (id INT)"]),
        true,
    )
    .await
    .unwrap();

    assert!(db.relation_exists("t1").await.unwrap());
    assert!(db.relation_exists("t2").await.unwrap());
}

#[tokio::test]
async fn test_execute_reports_failing_index() {
    let db = DuckDbBackend::in_memory().unwrap();
    let err = db
        .execute(
            &stmts(&["CREATE TABLE ok (id INT)", "CREATE TABLE broken (id NOPE)"]),
            false,
        )
        .await
        .unwrap_err();

    match err {
        DbError::ExecutionError {
            index, statement, ..
        } => {
            assert_eq!(index, 1);
            assert!(statement.contains("broken"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Outside a transaction the first statement stays applied
    assert!(db.relation_exists("ok").await.unwrap());
}

#[tokio::test]
async fn test_execute_rolls_back_in_transaction() {
    let db = DuckDbBackend::in_memory().unwrap();
    let result = db
        .execute(
            &stmts(&["CREATE TABLE staged (id INT)", "SELECT * FROM missing_table"]),
            true,
        )
        .await;

    assert!(matches!(result, Err(DbError::ExecutionError { index: 1, .. })));
    assert!(!db.relation_exists("staged").await.unwrap());
}

#[tokio::test]
async fn test_relation_not_exists() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert!(!db.relation_exists("nonexistent").await.unwrap());
}

#[tokio::test]
async fn test_relation_exists_qualified() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute(
        &stmts(&["CREATE SCHEMA app", "CREATE VIEW app.v AS SELECT 1 AS id"]),
        true,
    )
    .await
    .unwrap();

    assert!(db.relation_exists("app.v").await.unwrap());
    assert!(!db.relation_exists("v").await.unwrap());
}

#[tokio::test]
async fn test_read_never_migrated() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert_eq!(db.read().await.unwrap(), VersionRecord::EMPTY);
    // Reading does not create the version table
    assert!(!db.relation_exists("schema_migrations").await.unwrap());
}

#[tokio::test]
async fn test_write_then_read() {
    let db = DuckDbBackend::in_memory().unwrap();
    let dirty = VersionRecord::dirty(SchemaVersion::new(3));
    db.write(dirty).await.unwrap();
    assert_eq!(db.read().await.unwrap(), dirty);

    let clean = VersionRecord::clean(SchemaVersion::new(3));
    db.write(clean).await.unwrap();
    db.write(clean).await.unwrap();
    assert_eq!(db.read().await.unwrap(), clean);
}

#[tokio::test]
async fn test_write_keeps_single_row() {
    let db = DuckDbBackend::in_memory().unwrap();
    for v in 1..=4 {
        db.write(VersionRecord::clean(SchemaVersion::new(v)))
            .await
            .unwrap();
    }
    let conn = db.connection().unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_write_empty_clears_record() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.write(VersionRecord::clean(SchemaVersion::new(2)))
        .await
        .unwrap();
    db.write(VersionRecord::EMPTY).await.unwrap();
    assert_eq!(db.read().await.unwrap(), VersionRecord::EMPTY);
}

#[tokio::test]
async fn test_custom_options() {
    let db = DuckDbBackend::in_memory()
        .unwrap()
        .with_options(StoreOptions {
            migrations_table: "app_versions".to_string(),
            lock_table: "app_lock".to_string(),
            schema: Some("ops".to_string()),
        });
    db.write(VersionRecord::clean(SchemaVersion::new(7)))
        .await
        .unwrap();

    assert!(db.relation_exists("ops.app_versions").await.unwrap());
    assert!(!db.relation_exists("main.schema_migrations").await.unwrap());
    assert_eq!(
        db.read().await.unwrap(),
        VersionRecord::clean(SchemaVersion::new(7))
    );
}

#[tokio::test]
async fn test_lock_excludes_second_holder() {
    let a = DuckDbBackend::in_memory().unwrap();
    let b = a.try_clone().unwrap();

    let handle = a.acquire().await.unwrap();
    assert_eq!(handle.key(), "main.schema_migrations");
    assert!(matches!(b.acquire().await, Err(DbError::LockBusy { .. })));

    a.release(&handle).await.unwrap();
    let handle = b.acquire().await.unwrap();
    b.release(&handle).await.unwrap();
}

#[test]
fn test_racing_acquires_on_fresh_database() {
    for round in 0..20 {
        let temp = tempdir().unwrap();
        let a = DuckDbBackend::from_path(&temp.path().join("race.duckdb")).unwrap();
        let b = a.try_clone().unwrap();
        let barrier = std::sync::Barrier::new(2);

        let results: Vec<DbResult<LockHandle>> = std::thread::scope(|scope| {
            let racers: Vec<_> = [&a, &b]
                .into_iter()
                .map(|db| {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        db.acquire_sync()
                    })
                })
                .collect();
            racers.into_iter().map(|r| r.join().unwrap()).collect()
        });

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let busy = results
            .iter()
            .filter(|r| matches!(r, Err(DbError::LockBusy { .. })))
            .count();
        assert_eq!((winners, busy), (1, 1), "round {round}: {results:?}");
    }
}

#[test]
fn test_conflict_messages_count_as_contention() {
    assert!(is_lock_contention(
        "Constraint Error: Duplicate key \"lock_key: main.schema_migrations\" violates primary key constraint"
    ));
    assert!(is_lock_contention(
        "TransactionContext Error: Catalog write-write conflict on create with \"schema_migrations_lock\""
    ));
    assert!(!is_lock_contention("IO Error: Could not set lock on file"));
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let db = DuckDbBackend::in_memory().unwrap();
    let handle = db.acquire().await.unwrap();
    db.release(&handle).await.unwrap();
    db.release(&handle).await.unwrap();

    // Release before the lock table exists
    let fresh = DuckDbBackend::in_memory().unwrap();
    fresh.release(&handle).await.unwrap();
}

#[tokio::test]
async fn test_stale_handle_does_not_release_new_holder() {
    let a = DuckDbBackend::in_memory().unwrap();
    let b = a.try_clone().unwrap();

    let stale = a.acquire().await.unwrap();
    a.force_release().await.unwrap();
    let current = b.acquire().await.unwrap();

    a.release(&stale).await.unwrap();
    assert!(matches!(a.acquire().await, Err(DbError::LockBusy { .. })));
    b.release(&current).await.unwrap();
}

#[tokio::test]
async fn test_force_release_clears_abandoned_lock() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("app.duckdb");

    {
        let crashed = DuckDbBackend::from_path(&path).unwrap();
        crashed.acquire().await.unwrap();
    }

    let db = DuckDbBackend::new(path.to_str().unwrap()).unwrap();
    assert!(matches!(db.acquire().await, Err(DbError::LockBusy { .. })));
    db.force_release().await.unwrap();
    let handle = db.acquire().await.unwrap();
    db.release(&handle).await.unwrap();
}

#[tokio::test]
async fn test_record_survives_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("app.duckdb");

    {
        let db = DuckDbBackend::from_path(&path).unwrap();
        db.write(VersionRecord::dirty(SchemaVersion::new(5)))
            .await
            .unwrap();
    }

    let db = DuckDbBackend::from_path(&path).unwrap();
    assert_eq!(
        db.read().await.unwrap(),
        VersionRecord::dirty(SchemaVersion::new(5))
    );
}
