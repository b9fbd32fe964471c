//! Single-table SQLite backend
//!
//! All values live in `cachevalues(key TEXT PRIMARY KEY, data BLOB)`. The
//! connection runs in autocommit mode so each call is durable on its own;
//! `begin_batch`/`end_batch` open and commit a deferred transaction for bulk
//! rewrites.

use crate::error::StorageError;
use crate::store::{KeyPattern, KeyValueStore};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Database file name inside a store root.
pub const DB_FILE_NAME: &str = "cache.sqlite";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cachevalues (
    key TEXT PRIMARY KEY,
    data BLOB
);";

/// Store backed by one SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (and create if missing) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Unavailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StorageError::Unavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Throwaway database held in memory.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        if let Some(p) = &path {
            debug!("Opened sqlite cache store at {}", p.display());
        }
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Whether the connection is in autocommit mode (no open batch).
    pub fn is_autocommit(&self) -> bool {
        self.conn.lock().is_autocommit()
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn.lock();
        let data = conn
            .query_row(
                "SELECT data FROM cachevalues WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<Vec<u8>>>(0),
            )
            .optional()?;
        Ok(data.flatten())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.conn.lock().execute(
            "REPLACE INTO cachevalues (key, data) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute("DELETE FROM cachevalues WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM cachevalues WHERE key = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn keys(&self, pattern: Option<&str>) -> Result<Vec<String>, StorageError> {
        let compiled = pattern.map(KeyPattern::new).transpose()?;
        // Narrow by the pattern's literal prefix in SQL; globset decides the match.
        let prefix = compiled.as_ref().map_or("", |p| p.literal_prefix());
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key FROM cachevalues WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
        let mut keys = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        if let Some(compiled) = &compiled {
            keys.retain(|k| compiled.matches(k));
        }
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.conn.lock().execute("DELETE FROM cachevalues", [])?;
        Ok(())
    }

    fn keys_after(&self, cursor: Option<&str>, limit: usize) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT key FROM cachevalues WHERE ?1 IS NULL OR key > ?1 ORDER BY key LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![cursor, limit], |row| row.get::<_, String>(0))?;
        let keys = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn begin_batch(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    fn end_batch(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite {}", path.display()),
            None => "sqlite (in-memory)".to_string(),
        }
    }
}
