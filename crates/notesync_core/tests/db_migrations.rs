use notesync_core::db::migrations::{apply_migrations, latest_version, schema_version};
use notesync_core::db::{open_db, open_db_in_memory, DbError};
use notesync_core::error::ErrorClass;
use notesync_core::storage::{KvStore, SqliteKvStore};
use rusqlite::Connection;

#[test]
fn fresh_database_is_migrated_to_latest() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    let columns: Vec<String> = conn
        .prepare("SELECT name FROM pragma_table_info('kv_entries') ORDER BY cid;")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(columns, vec!["namespace", "key", "value", "updated_at"]);
}

#[test]
fn rerunning_migrations_is_a_no_op() {
    let mut conn = open_db_in_memory().unwrap();

    assert_eq!(apply_migrations(&mut conn).unwrap(), latest_version());
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
}

#[test]
fn persisted_queue_blob_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notesync.db");
    let key = "note-sync-queue-v1:u1";

    {
        let store = SqliteKvStore::open(&path, "notesync").unwrap();
        store.set(key, "[]").unwrap();
        store.set(key, r#"[{"id":"m1"}]"#).unwrap();
    }

    let reopened = SqliteKvStore::new(open_db(&path).unwrap(), "notesync");
    assert_eq!(
        reopened.get(key).unwrap().as_deref(),
        Some(r#"[{"id":"m1"}]"#)
    );
}

#[test]
fn namespaces_share_a_file_without_colliding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let web = SqliteKvStore::open(&path, "web").unwrap();
    let desktop = SqliteKvStore::open(&path, "desktop").unwrap();
    web.set("k", "web-value").unwrap();
    desktop.set("k", "desktop-value").unwrap();
    desktop.remove("k").unwrap();

    assert_eq!(web.get("k").unwrap().as_deref(), Some("web-value"));
    assert_eq!(desktop.get("k").unwrap(), None);
}

#[test]
fn database_from_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("PRAGMA user_version = 999;")
        .unwrap();

    let err = open_db(&path).unwrap_err();
    assert_eq!(err.class(), ErrorClass::ConfigurationFatal);
    match err {
        DbError::SchemaTooNew { found, supported } => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}
