//! SQLite-backed key-value store.
//!
//! # Invariants
//! - The connection is fully migrated before the store is constructed.
//! - Every successful `set` bumps the key's `write_count`.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::store::{KeyValueStore, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    /// Number of successful writes recorded for `key` (0 when absent).
    pub fn write_count(&self, key: &str) -> StoreResult<u64> {
        let count = self
            .conn
            .query_row(
                "SELECT write_count FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(count.map_or(0, |value| u64::try_from(value).unwrap_or(0)))
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (key, value, write_count)
             VALUES (?1, ?2, 1)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                write_count = kv_entries.write_count + 1,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        Ok(())
    }
}
