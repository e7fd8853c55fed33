//! SQLite storage adapter for the web time tracker.
//!
//! Implements [`wt_core::KeyValueStore`] over a single `kv` table with
//! JSON values, mirroring the key-per-record layout the core expects
//! from browser-profile storage.
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. The tracker process is single-threaded, so the store is
//! owned by the engine and never shared.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use wt_core::{KeyValueStore, StoreError};

/// Key-value store backed by a SQLite database file.
///
/// Values are serialized JSON stored as TEXT; each `set` replaces the
/// whole record, matching the read-modify-write units in the core.
pub struct SqliteStore {
    conn: Connection,
}

fn sqlite_unavailable(error: &rusqlite::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

impl SqliteStore {
    /// Opens a store at the given path, creating the file and schema if
    /// necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| sqlite_unavailable(&e))?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Self::init(conn)
    }

    /// Opens an in-memory store that lives for the process only.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| sqlite_unavailable(&e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| sqlite_unavailable(&e))?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| sqlite_unavailable(&e))?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value.to_string()],
        )
        .map_err(|e| sqlite_unavailable(&e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| sqlite_unavailable(&e))?;
        Ok(())
    }
}
