//! Durable second cache level
//!
//! Rows are keyed by `(endpoint, params_hash)` and carry an absolute expiry in
//! Unix milliseconds, so entries survive a restart with their remaining lifetime.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::isotrack_errors::IsotrackError;

use super::CacheKey;

/// A payload read back from a durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    /// JSON-serialized cached value
    pub payload: String,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

impl StoredEntry {
    /// Milliseconds left before expiry at `now_ms` (0 when already expired).
    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        (self.expires_at_ms - now_ms).max(0) as u64
    }
}

/// Persistent key/value storage behind the in-memory cache.
pub trait DurableStore: Send + Sync {
    /// Unexpired entry under `key` at `now_ms`, if any.
    fn load(&self, key: &CacheKey, now_ms: i64) -> Result<Option<StoredEntry>, IsotrackError>;

    /// Insert or replace the entry under `key`.
    fn store(&self, key: &CacheKey, entry: &StoredEntry) -> Result<(), IsotrackError>;

    /// Delete every entry expired at `now_ms`; returns the number of rows removed.
    fn purge_expired(&self, now_ms: i64) -> Result<usize, IsotrackError>;
}

/// Wall-clock time in Unix milliseconds.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// SQLite-backed [`DurableStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create or open the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IsotrackError> {
        let conn = Connection::open(path)?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, IsotrackError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), IsotrackError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS api_cache (
                endpoint TEXT NOT NULL,
                params_hash TEXT NOT NULL,
                response_data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (endpoint, params_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_api_cache_expires_at ON api_cache(expires_at);
            "#,
        )?;
        Ok(())
    }
}

impl DurableStore for SqliteStore {
    fn load(&self, key: &CacheKey, now_ms: i64) -> Result<Option<StoredEntry>, IsotrackError> {
        let conn = self.conn.lock();
        let entry = conn
            .query_row(
                "SELECT response_data, created_at, expires_at FROM api_cache
                 WHERE endpoint = ?1 AND params_hash = ?2 AND expires_at > ?3",
                params![key.endpoint(), key.params_hash(), now_ms],
                |row| {
                    Ok(StoredEntry {
                        payload: row.get(0)?,
                        created_at_ms: row.get(1)?,
                        expires_at_ms: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn store(&self, key: &CacheKey, entry: &StoredEntry) -> Result<(), IsotrackError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO api_cache
             (endpoint, params_hash, response_data, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.endpoint(),
                key.params_hash(),
                entry.payload,
                entry.created_at_ms,
                entry.expires_at_ms
            ],
        )?;
        Ok(())
    }

    fn purge_expired(&self, now_ms: i64) -> Result<usize, IsotrackError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM api_cache WHERE expires_at <= ?1", params![now_ms])?;
        Ok(removed)
    }
}
