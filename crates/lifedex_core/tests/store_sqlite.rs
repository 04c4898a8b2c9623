use lifedex_core::db::migrations::latest_version;
use lifedex_core::db::{open_db, open_db_in_memory, DbError};
use lifedex_core::testing::ManualClock;
use lifedex_core::{
    AddXpRequest, KeyValueStore, PersistenceConfig, ProgressSession, SqliteKvStore,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "kv_entries");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifedex.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "kv_entries");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = match SqliteKvStore::open(&path) {
        Err(err) => err,
        Ok(_) => panic!("newer schema should be rejected"),
    };
    assert!(err.is_version_mismatch(), "unexpected error: {err}");
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
fn set_replaces_whole_values_and_counts_writes() {
    let store = SqliteKvStore::open_in_memory().unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    assert_eq!(store.write_count("k").unwrap(), 0);

    store.set("k", "first").unwrap();
    store.set("k", "second").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
    assert_eq!(store.write_count("k").unwrap(), 2);

    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    store.remove("k").unwrap();
}

#[test]
fn session_state_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifedex.sqlite3");

    let id = {
        let store = SqliteKvStore::open(&path).unwrap();
        let mut session = ProgressSession::open_with_clock(
            store,
            PersistenceConfig::default(),
            ManualClock::new(1_700_000_000_000),
        );
        let id = session.state().trackers[0].id.clone();
        session
            .add_xp(&id, AddXpRequest::new(4).with_text("zzz"))
            .unwrap();
        assert!(session.flush().is_some_and(|outcome| outcome.is_written()));
        id
    };

    let store = SqliteKvStore::open(&path).unwrap();
    assert_eq!(store.write_count("lifedex_v2").unwrap(), 1);
    let session = ProgressSession::open_with_clock(
        store,
        PersistenceConfig::default(),
        ManualClock::new(1_700_000_000_000),
    );
    let tracker = session.state().tracker(&id).unwrap();
    assert_eq!(tracker.xp, 95 + 4);
    assert_eq!(tracker.log[0].text, "zzz");
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
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
