//! Persistent identity cache over SQLite: WAL mode, one table per cache.
//!
//! The environment directory holds a single `identity.db`. Each named cache
//! (`names`, `calls`) is a `key TEXT PRIMARY KEY, value TEXT` table keyed by
//! the 9-digit MMSI. A `put` whose value matches what is stored performs no
//! write; every other `put` commits before returning.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// File name of the database inside the environment directory.
pub const DB_FILE: &str = "identity.db";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open store {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("invalid cache name {0:?}")]
    InvalidName(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

type SharedConn = Arc<Mutex<Connection>>;

fn lock(conn: &SharedConn) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Shared handle on the store directory. Caches opened from it share one
/// connection.
pub struct StoreEnv {
    path: PathBuf,
    conn: SharedConn,
}

impl StoreEnv {
    /// Open or create the environment in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DB_FILE);

        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(StoreEnv {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (creating if needed) the cache called `name`.
    pub fn cache(&self, name: &str) -> StoreResult<PersistentCache> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        lock(&self.conn).execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (key TEXT PRIMARY KEY, value TEXT NOT NULL);"
        ))?;

        Ok(PersistentCache {
            name: name.to_string(),
            conn: Arc::clone(&self.conn),
            writes: 0,
        })
    }

    /// Checkpoint the WAL into the main database file and release the
    /// connection once no cache holds it.
    pub fn close(self) -> StoreResult<()> {
        lock(&self.conn).execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        if let Ok(mutex) = Arc::try_unwrap(self.conn) {
            let conn = mutex.into_inner().unwrap_or_else(PoisonError::into_inner);
            conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// One named key/value cache.
pub struct PersistentCache {
    name: String,
    conn: SharedConn,
    writes: u64,
}

impl PersistentCache {
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = lock(&self.conn)
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.name),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store `value` under `key` unless it is already stored there.
    pub fn put(&mut self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = lock(&self.conn);
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.name),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        if current.as_deref() == Some(value) {
            return Ok(());
        }

        tx.execute(
            &format!(
                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                self.name
            ),
            params![key, value],
        )?;
        tx.commit()?;
        self.writes += 1;
        Ok(())
    }

    /// Durable writes performed by this handle.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Release this handle on the environment. Returns the write count.
    pub fn close(self) -> u64 {
        let writes = self.writes();
        tracing::debug!(cache = %self.name, writes, "cache closed");
        drop(self.conn);
        writes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
