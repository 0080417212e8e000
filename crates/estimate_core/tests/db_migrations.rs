use estimate_core::db::migrations::latest_version;
use estimate_core::db::{open_db, open_db_in_memory, open_db_with_config, DbError};
use estimate_core::{
    ReconcileConfig, RepoError, SqliteReconciliationRepository, SqliteSowItemRepository,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().expect("in-memory database should open");

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "sow_items");
    assert_table_exists(&conn, "reconciliation_entries");
    assert_table_exists(&conn, "reconciliation_events");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("estimate.db");

    let conn_first = open_db(&path).expect("file database should open");
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let config = ReconcileConfig {
        busy_timeout_ms: 250,
        ..ReconcileConfig::default()
    };
    let conn_second =
        open_db_with_config(&path, &config).expect("file database should open with config");
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "reconciliation_entries");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).expect("sqlite file should open");
    conn.execute_batch("PRAGMA user_version = 999;").expect("sql should run");
    drop(conn);

    let err = open_db(&path).expect_err("open should fail");
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let mut conn = Connection::open_in_memory().expect("raw in-memory connection should open");

    let err = SqliteSowItemRepository::try_new(&conn)
        .err()
        .expect("repository should reject the connection");
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));

    let err = SqliteReconciliationRepository::try_new(&mut conn)
        .err()
        .expect("repository should reject the connection");
    assert!(matches!(err, RepoError::UninitializedConnection { .. }));
}

#[test]
fn duplicate_sequence_under_one_parent_is_rejected_by_schema() {
    let conn = open_db_in_memory().expect("in-memory database should open");
    conn.execute_batch(
        "INSERT INTO sow_items (id, line_no, description, activity)
         VALUES ('00000000-0000-0000-0000-000000000001', 15, 'Drywall', 'REPAIR');",
    )
    .expect("sql should run");

    let insert = |id: &str| {
        conn.execute(
            "INSERT INTO reconciliation_entries (
                id, sow_item_id, kind, activity,
                labor_cost_cents, material_cost_cents, equipment_cost_cents, total_cost_cents,
                is_change_order, co_sequence_no, co_source_line_no
            ) VALUES (?1, '00000000-0000-0000-0000-000000000001', 'add', 'REPAIR',
                      0, 0, 0, 0, 1, 1, 15);",
            [id],
        )
    };

    insert("00000000-0000-0000-0000-0000000000a1").expect("first numbered entry should insert");
    let err = insert("00000000-0000-0000-0000-0000000000a2")
        .expect_err("duplicate insert should fail");
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .expect("query should return a row")
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .expect("query should return a row");
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
