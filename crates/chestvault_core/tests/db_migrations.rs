use chestvault_core::db::{latest_version, open_db, open_db_in_memory, schema_version, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "container_records");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chestvault.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "container_records");
}

#[test]
fn record_key_is_unique_regardless_of_owner_case() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO container_records (owner_name, group_name, chest_data) VALUES (?1, ?2, ?3);",
        rusqlite::params!["Alex", "default", vec![0u8]],
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO container_records (owner_name, group_name, chest_data) VALUES (?1, ?2, ?3);",
        rusqlite::params!["ALEX", "default", vec![0u8]],
    );
    assert!(duplicate.is_err());

    conn.execute(
        "INSERT INTO container_records (owner_name, group_name, chest_data) VALUES (?1, ?2, ?3);",
        rusqlite::params!["Alex", "nether", vec![0u8]],
    )
    .unwrap();
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
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
fn current_version_without_records_table_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gutted.db");

    let conn = open_db(&path).unwrap();
    conn.execute_batch("DROP TABLE container_records;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::MissingTable("container_records")));
}

#[test]
fn failed_step_is_named_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conflict.db");

    // A view squatting on the table name makes the first step fail.
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE VIEW container_records AS SELECT 1 AS id;")
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::MigrationFailed { version, name, .. } => {
            assert_eq!(version, 1);
            assert_eq!(name, "container_records");
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);
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
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
