//! SQLite backend
//!
//! Stores the three value kinds in three tables:
//!
//! ```text
//! kv_strings (key, value)            -- entry bodies
//! kv_sets    (key, member)           -- tag/domain members and catalogs
//! kv_zsets   (key, member, score)    -- entry_index
//! ```
//!
//! Each kind has its own table, so kinds are not checked against each other:
//! the same key may exist as a string and as a set.
//!
//! Every [`Backend::transaction`] runs as `BEGIN IMMEDIATE ... COMMIT`; any
//! error inside the closure drops the transaction, which rolls it back.

use crate::storage::backend::{Backend, KvRead, KvWrite};
use crate::storage::{StorageError, StorageResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv_strings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS kv_sets (
        key TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (key, member)
    );
    CREATE TABLE IF NOT EXISTS kv_zsets (
        key TEXT NOT NULL,
        member TEXT NOT NULL,
        score REAL NOT NULL,
        PRIMARY KEY (key, member)
    );
    CREATE INDEX IF NOT EXISTS idx_zsets_score ON kv_zsets(key, score);
";

/// SQLite-backed key-value store
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Create or open a database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Configure for performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Opened sqlite backend at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file path (`None` for in-memory databases)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Backend for SqliteBackend {
    fn read<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn KvRead) -> StorageResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        f(&SqliteView { conn: &*conn })
    }

    fn transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut dyn KvWrite) -> StorageResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut txn = SqliteTxn { tx };

        match f(&mut txn) {
            Ok(value) => {
                txn.tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Dropping the transaction rolls it back
                tracing::debug!("Rolling back sqlite transaction: {}", err);
                Err(err)
            }
        }
    }
}

/// Read access over a connection or an open transaction
struct SqliteView<'c> {
    conn: &'c Connection,
}

impl KvRead for SqliteView<'_> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM kv_strings WHERE key = ?")?;
        Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
    }

    fn smembers(&self, key: &str) -> StorageResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT member FROM kv_sets WHERE key = ?")?;
        let rows = stmt.query_map(params![key], |row| row.get(0))?;
        Ok(rows.collect::<Result<BTreeSet<String>, _>>()?)
    }

    fn scard(&self, key: &str) -> StorageResult<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM kv_sets WHERE key = ?")?;
        let count: i64 = stmt.query_row(params![key], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn sismember(&self, key: &str, member: &str) -> StorageResult<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM kv_sets WHERE key = ? AND member = ?")?;
        Ok(stmt.exists(params![key, member])?)
    }

    fn zcard(&self, key: &str) -> StorageResult<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM kv_zsets WHERE key = ?")?;
        let count: i64 = stmt.query_row(params![key], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT score FROM kv_zsets WHERE key = ? AND member = ?")?;
        Ok(stmt
            .query_row(params![key, member], |row| row.get(0))
            .optional()?)
    }

    fn zrevrange(&self, key: &str, start: usize, stop: Option<usize>) -> StorageResult<Vec<String>> {
        // A negative OFFSET reads from 0 in SQLite; past i64::MAX nothing exists
        let Ok(offset) = i64::try_from(start) else {
            return Ok(Vec::new());
        };
        // LIMIT -1 means no limit
        let limit = match stop {
            Some(stop) => i64::try_from(stop.saturating_sub(start)).unwrap_or(-1),
            None => -1,
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT member FROM kv_zsets WHERE key = ?
             ORDER BY score DESC, member DESC
             LIMIT ? OFFSET ?",
        )?;
        let rows = stmt.query_map(params![key, limit, offset], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn zrevrange_by_score(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT member FROM kv_zsets
             WHERE key = ? AND score >= ? AND score < ?
             ORDER BY score DESC, member DESC",
        )?;
        let rows = stmt.query_map(params![key, min, max], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }
}

/// An open `BEGIN IMMEDIATE` transaction
struct SqliteTxn<'c> {
    tx: Transaction<'c>,
}

impl SqliteTxn<'_> {
    fn view(&self) -> SqliteView<'_> {
        SqliteView { conn: &*self.tx }
    }
}

impl KvRead for SqliteTxn<'_> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.view().get(key)
    }

    fn smembers(&self, key: &str) -> StorageResult<BTreeSet<String>> {
        self.view().smembers(key)
    }

    fn scard(&self, key: &str) -> StorageResult<usize> {
        self.view().scard(key)
    }

    fn sismember(&self, key: &str, member: &str) -> StorageResult<bool> {
        self.view().sismember(key, member)
    }

    fn zcard(&self, key: &str) -> StorageResult<usize> {
        self.view().zcard(key)
    }

    fn zscore(&self, key: &str, member: &str) -> StorageResult<Option<f64>> {
        self.view().zscore(key, member)
    }

    fn zrevrange(&self, key: &str, start: usize, stop: Option<usize>) -> StorageResult<Vec<String>> {
        self.view().zrevrange(key, start, stop)
    }

    fn zrevrange_by_score(&self, key: &str, min: f64, max: f64) -> StorageResult<Vec<String>> {
        self.view().zrevrange_by_score(key, min, max)
    }
}

impl KvWrite for SqliteTxn<'_> {
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.tx.execute(
            "INSERT OR REPLACE INTO kv_strings (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn del(&mut self, key: &str) -> StorageResult<bool> {
        let mut removed = 0;
        for sql in [
            "DELETE FROM kv_strings WHERE key = ?",
            "DELETE FROM kv_sets WHERE key = ?",
            "DELETE FROM kv_zsets WHERE key = ?",
        ] {
            removed += self.tx.execute(sql, params![key])?;
        }
        Ok(removed > 0)
    }

    fn sadd(&mut self, key: &str, member: &str) -> StorageResult<bool> {
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO kv_sets (key, member) VALUES (?, ?)",
            params![key, member],
        )?;
        Ok(inserted > 0)
    }

    fn srem(&mut self, key: &str, member: &str) -> StorageResult<bool> {
        let removed = self.tx.execute(
            "DELETE FROM kv_sets WHERE key = ? AND member = ?",
            params![key, member],
        )?;
        Ok(removed > 0)
    }

    fn zadd(&mut self, key: &str, member: &str, score: f64) -> StorageResult<bool> {
        let existed = self.zscore(key, member)?.is_some();
        self.tx.execute(
            "INSERT OR REPLACE INTO kv_zsets (key, member, score) VALUES (?, ?, ?)",
            params![key, member, score],
        )?;
        Ok(!existed)
    }

    fn zrem(&mut self, key: &str, member: &str) -> StorageResult<bool> {
        let removed = self.tx.execute(
            "DELETE FROM kv_zsets WHERE key = ? AND member = ?",
            params![key, member],
        )?;
        Ok(removed > 0)
    }
}
