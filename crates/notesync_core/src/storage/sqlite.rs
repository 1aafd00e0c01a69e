//! SQLite-backed key-value store over the `kv_entries` table.

use super::{KvStore, StorageResult};
use crate::db::open_db;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Key-value store scoped to one namespace of a migrated database.
pub struct SqliteKvStore {
    conn: Connection,
    namespace: String,
}

impl SqliteKvStore {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: Connection, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>) -> StorageResult<Self> {
        let conn = open_db(path)?;
        Ok(Self::new(conn, namespace))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Lists keys in this namespace that start with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key
             FROM kv_entries
             WHERE namespace = ?1
               AND substr(key, 1, length(?2)) = ?2
             ORDER BY key ASC;",
        )?;
        let rows = stmt.query_map(params![self.namespace, prefix], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2;",
                params![self.namespace, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, strftime('%s', 'now') * 1000)
             ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![self.namespace, key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2;",
            params![self.namespace, key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteKvStore;
    use crate::db::open_db_in_memory;
    use crate::storage::KvStore;

    #[test]
    fn set_overwrites_and_remove_deletes() {
        let store = SqliteKvStore::new(open_db_in_memory().unwrap(), "app");
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn keys_with_prefix_stays_inside_namespace() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteKvStore::new(conn, "app");
        store.set("note-sync-queue-v1:a", "[]").unwrap();
        store.set("note-sync-queue-v1:b", "[]").unwrap();
        store.set("other", "x").unwrap();

        let keys = store.keys_with_prefix("note-sync-queue-v1:").unwrap();
        assert_eq!(keys, vec!["note-sync-queue-v1:a", "note-sync-queue-v1:b"]);
    }
}
