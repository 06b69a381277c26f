//! SQLite content store.
//!
//! One row per logical file in the `files` table. Mutations run inside an
//! immediate transaction so a row moves to its new state completely or not
//! at all; reads go straight to the connection.
//!
//! # Concurrency Model
//!
//! The connection sits behind a `parking_lot::Mutex`, so store calls from
//! different threads queue on it. Anything finer grained (busy waits on a
//! database shared between processes) is left to SQLite and its busy timeout.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{Mutex, MutexGuard};
use rowfs_types::{CanonicalKey, FileRecord};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::config::RowFsConfig;
use crate::error::{FsError, FsResult};

const SCHEMA: &str = r#"
-- One row per file. `size` always equals length(content).
CREATE TABLE IF NOT EXISTS files (
    path TEXT PRIMARY KEY NOT NULL,
    content BLOB NOT NULL,
    size INTEGER NOT NULL,
    modified_at INTEGER NOT NULL
);
"#;

/// Upsert that keeps `modified_at` strictly increasing per row, even when two
/// commits land in the same millisecond.
const UPSERT: &str = "
    INSERT INTO files (path, content, size, modified_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(path) DO UPDATE SET
        content = excluded.content,
        size = excluded.size,
        modified_at = MAX(excluded.modified_at, files.modified_at + 1)
    RETURNING modified_at";

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Shared relational store holding every file's bytes and metadata.
pub struct ContentStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("conn", &"<locked>")
            .finish()
    }
}

impl ContentStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open the database named by a config, applying its busy timeout.
    pub fn open_with(config: &RowFsConfig) -> FsResult<Self> {
        let conn = Connection::open(&config.database)?;
        conn.busy_timeout(config.busy_timeout())?;
        debug!(database = %config.database.display(), "opened content store");
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> FsResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> FsResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection. Callers must not re-enter the store while holding it.
    pub(crate) fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // =========================================================================
    // Row operations
    // =========================================================================

    /// Whether a record exists for `key`.
    pub fn exists(&self, key: &CanonicalKey) -> FsResult<bool> {
        exists_in(&self.connection(), key)
    }

    /// Content of the record for `key`; `NotFound` if there is none.
    pub fn read(&self, key: &CanonicalKey) -> FsResult<Vec<u8>> {
        read_in(&self.connection(), key)?.ok_or_else(|| FsError::not_found(key))
    }

    /// Full record for `key`, if present.
    pub fn stat(&self, key: &CanonicalKey) -> FsResult<Option<FileRecord>> {
        let conn = self.connection();
        let row = conn
            .query_row(
                "SELECT content, modified_at FROM files WHERE path = ?1",
                params![key.as_str()],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(content, modified_at)| FileRecord::new(key.clone(), content, modified_at)))
    }

    /// Insert or replace the record for `key` as one atomic unit.
    pub fn upsert(&self, key: &CanonicalKey, content: &[u8], timestamp: i64) -> FsResult<FileRecord> {
        self.atomically(|tx| tx.upsert(key, content, timestamp))
    }

    /// Remove the record for `key`. Returns whether a row was deleted.
    pub fn delete(&self, key: &CanonicalKey) -> FsResult<bool> {
        self.atomically(|tx| tx.delete(key))
    }

    /// Keys starting with `prefix`, in order.
    pub fn list(&self, prefix: &str) -> FsResult<Vec<CanonicalKey>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT path FROM files WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path",
        )?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
        rows.map(|path| Ok(CanonicalKey::from_stored(path?)))
            .collect()
    }

    /// Run `f` inside one immediate transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. `f` must only use
    /// the [`StoreTx`] it is given; calling back into this store deadlocks.
    pub fn atomically<T>(&self, f: impl FnOnce(&StoreTx<'_>) -> FsResult<T>) -> FsResult<T> {
        let mut conn = self.connection();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&StoreTx { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

/// Row operations inside an open transaction.
pub struct StoreTx<'t> {
    conn: &'t Connection,
}

impl StoreTx<'_> {
    pub fn exists(&self, key: &CanonicalKey) -> FsResult<bool> {
        exists_in(self.conn, key)
    }

    pub fn read(&self, key: &CanonicalKey) -> FsResult<Vec<u8>> {
        read_in(self.conn, key)?.ok_or_else(|| FsError::not_found(key))
    }

    pub fn upsert(&self, key: &CanonicalKey, content: &[u8], timestamp: i64) -> FsResult<FileRecord> {
        let modified_at = self.conn.query_row(
            UPSERT,
            params![key.as_str(), content, content.len() as i64, timestamp],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(FileRecord::new(key.clone(), content.to_vec(), modified_at))
    }

    pub fn delete(&self, key: &CanonicalKey) -> FsResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM files WHERE path = ?1", params![key.as_str()])?;
        Ok(removed > 0)
    }
}

fn exists_in(conn: &Connection, key: &CanonicalKey) -> FsResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM files WHERE path = ?1)",
        params![key.as_str()],
        |row| row.get::<_, bool>(0),
    )?)
}

fn read_in(conn: &Connection, key: &CanonicalKey) -> FsResult<Option<Vec<u8>>> {
    Ok(conn
        .query_row(
            "SELECT content FROM files WHERE path = ?1",
            params![key.as_str()],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()?)
}
