//! # Cache & health tier
//!
//! Two cache levels in front of every provider call, plus the source health
//! ledger:
//!
//! 1. [`memory::MemoryCache`]: bounded process-local TTL map;
//! 2. an optional [`durable::DurableStore`] (SQLite by default) that survives
//!    restarts. Hits are promoted to memory with their remaining lifetime.
//!
//! Store calls run on the blocking pool. Writes are fire-and-forget and purge
//! expired rows as they go. Durable-store failures are logged and flip the
//! store tier to `failed` in the [`health::HealthLedger`]; they never fail the
//! request.
//!
//! Concurrent misses on the same key each run their producer. The last write wins.

pub mod durable;
pub mod health;
pub mod memory;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::{config::CacheConfig, isotrack_errors::IsotrackError};

use durable::{unix_millis, DurableStore, SqliteStore, StoredEntry};
use health::{HealthLedger, STORE_TIER};
use memory::{MemoryCache, DEFAULT_MAX_ENTRIES};

/// Cache key: an endpoint name plus its normalized request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: String,
    params: String,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>, params: impl Into<String>) -> Self {
        CacheKey {
            endpoint: endpoint.into(),
            params: params.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    /// SHA-256 of the normalized parameters, lowercase hex.
    pub fn params_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.params.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn memory_key(&self) -> String {
        format!("{}?{}", self.endpoint, self.params)
    }
}

/// Memory and durable cache levels sharing one health ledger.
pub struct CacheTier {
    memory: MemoryCache,
    durable: Option<Arc<dyn DurableStore>>,
    health: Arc<HealthLedger>,
    pending_writes: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheTier {
    pub fn new(durable: Option<Arc<dyn DurableStore>>) -> Self {
        Self::with_memory_capacity(durable, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_memory_capacity(durable: Option<Arc<dyn DurableStore>>, max_entries: usize) -> Self {
        let health = Arc::new(HealthLedger::new());
        if durable.is_some() {
            health.register(STORE_TIER);
        }
        CacheTier {
            memory: MemoryCache::with_max_entries(max_entries),
            durable,
            health,
            pending_writes: Mutex::new(Vec::new()),
        }
    }

    pub fn memory_only() -> Self {
        Self::new(None)
    }

    /// Tier described by `config`: SQLite-backed when a database path is set.
    ///
    /// A database that cannot be opened leaves the tier memory-only, with the
    /// store recorded as failed.
    pub fn from_config(config: &CacheConfig) -> Self {
        let capacity = config.memory_max_entries;
        let Some(path) = &config.database_path else {
            return Self::with_memory_capacity(None, capacity);
        };

        match SqliteStore::open(path) {
            Ok(store) => {
                match store.purge_expired(unix_millis()) {
                    Ok(removed) if removed > 0 => {
                        tracing::info!(removed, "purged expired durable cache entries")
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "durable cache purge failed"),
                }
                tracing::info!("durable cache at {}", path.display());
                Self::with_memory_capacity(Some(Arc::new(store)), capacity)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    "cannot open durable cache at {}, running memory-only",
                    path.display()
                );
                let tier = Self::with_memory_capacity(None, capacity);
                tier.health.record_store_outcome(false, Some(&err.to_string()));
                tier
            }
        }
    }

    pub fn health(&self) -> &HealthLedger {
        &self.health
    }

    /// Cached value under `key`, or the value computed by `producer` (then cached
    /// in both levels for `ttl`).
    ///
    /// Arguments
    /// ---------
    /// * `key`: endpoint and normalized parameters
    /// * `ttl`: lifetime of a freshly produced value
    /// * `producer`: computes the value on a miss; its error is returned as is and
    ///   nothing is cached
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<T, IsotrackError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, IsotrackError>>,
    {
        let memory_key = key.memory_key();

        if let Some(value) = self.memory.get(&memory_key) {
            match serde_json::from_value(value) {
                Ok(data) => {
                    tracing::debug!(endpoint = key.endpoint(), "memory cache hit");
                    return Ok(data);
                }
                Err(err) => {
                    tracing::warn!(endpoint = key.endpoint(), error = %err, "discarding unreadable memory cache entry");
                    self.memory.remove(&memory_key);
                }
            }
        }

        if let Some(data) = self.durable_lookup::<T>(key, &memory_key).await {
            return Ok(data);
        }

        tracing::debug!(endpoint = key.endpoint(), "cache miss");
        let data = producer().await?;

        let value = serde_json::to_value(&data)?;
        self.durable_write(key, &value, ttl);
        self.memory.insert(memory_key, value, ttl);
        Ok(data)
    }

    /// Number of entries held by the memory level, expired or not.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Wait for the durable writes issued so far.
    pub async fn flush_durable(&self) {
        let pending = std::mem::take(&mut *self.pending_writes.lock());
        for handle in pending {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "durable cache write task aborted");
            }
        }
    }

    async fn durable_lookup<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        memory_key: &str,
    ) -> Option<T> {
        let store = self.durable.clone()?;
        let now_ms = unix_millis();

        let lookup_key = key.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(&lookup_key, now_ms))
            .await
            .unwrap_or_else(|e| Err(IsotrackError::CacheStore(format!("Task join error: {e}"))));

        let entry = match loaded {
            Ok(entry) => {
                self.health.record_store_outcome(true, None);
                entry?
            }
            Err(err) => {
                tracing::warn!(endpoint = key.endpoint(), error = %err, "durable cache read failed");
                self.health.record_store_outcome(false, Some(&err.to_string()));
                return None;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(&entry.payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(endpoint = key.endpoint(), error = %err, "unreadable durable cache entry");
                return None;
            }
        };
        let data = serde_json::from_value(value.clone()).ok()?;

        tracing::debug!(endpoint = key.endpoint(), "durable cache hit, promoting");
        self.memory.insert(
            memory_key,
            value,
            Duration::from_millis(entry.remaining_ms(now_ms)),
        );
        Some(data)
    }

    /// Store `value` in the durable level without waiting for it, then drop the
    /// rows that have expired.
    fn durable_write(&self, key: &CacheKey, value: &serde_json::Value, ttl: Duration) {
        let Some(store) = self.durable.clone() else {
            return;
        };
        let health = self.health.clone();
        let key = key.clone();
        let now_ms = unix_millis();
        let entry = StoredEntry {
            payload: value.to_string(),
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(ttl.as_millis() as i64),
        };

        let handle = tokio::task::spawn_blocking(move || {
            let written = store
                .store(&key, &entry)
                .and_then(|()| store.purge_expired(now_ms));
            match written {
                Ok(removed) => {
                    if removed > 0 {
                        tracing::debug!(removed, "purged expired durable cache entries");
                    }
                    health.record_store_outcome(true, None);
                }
                Err(err) => {
                    tracing::warn!(endpoint = key.endpoint(), error = %err, "durable cache write failed");
                    health.record_store_outcome(false, Some(&err.to_string()));
                }
            }
        });

        let mut pending = self.pending_writes.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}
