use rusqlite::Connection;
use unittree_core::db::migrations::latest_version;
use unittree_core::db::{open_db, open_db_in_memory, DbError};
use unittree_core::repo::unit_repo::SqliteUnitRepository;
use unittree_core::{RepoError, ID_NULL, ID_ROOT};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "units");
    assert_table_exists(&conn, "unit_users");
    assert_table_exists(&conn, "unit_sectors");
}

#[test]
fn root_unit_is_seeded_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("units.db");

    drop(open_db(&path).unwrap());
    let conn = open_db(&path).unwrap();

    let (count, id_parent): (i64, i32) = conn
        .query_row(
            "SELECT COUNT(*), MAX(id_parent) FROM units WHERE id_unit = ?1;",
            [ID_ROOT],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(id_parent, ID_NULL);
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
fn deleted_root_unit_is_reported_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rootless.db");

    let conn = open_db(&path).unwrap();
    conn.execute("DELETE FROM units WHERE id_unit = ?1;", [ID_ROOT])
        .unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::RootUnitMissing(id) => assert_eq!(id, ID_ROOT),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repository_refuses_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteUnitRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection was accepted"),
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();

    let err = conn
        .execute(
            "INSERT INTO unit_users (id_user, id_unit) VALUES (1, 4242);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "missing table {table}");
}
