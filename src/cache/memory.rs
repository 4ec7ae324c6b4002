use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// A cached value with its creation time and time-to-live.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        CacheEntry {
            data,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// Expired once strictly more than `ttl` has elapsed since creation.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

/// Default bound of a [`MemoryCache`].
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// In-process TTL map bounded to `max_entries`.
///
/// Expired entries are evicted on lookup and swept on every insert. A full map
/// drops its oldest entry to make room.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry<Value>>>,
    max_entries: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        MemoryCache {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Live value under `key`; an expired entry is removed and reported absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.data.clone()),
            None => None,
        }
    }

    /// Insert or replace the entry under `key`.
    pub fn insert(&self, key: impl Into<String>, data: Value, ttl: Duration) {
        let key = key.into();
        let mut entries = self.entries.lock();

        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));

        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone())
            {
                tracing::debug!(key = %oldest, "memory cache full, evicting oldest entry");
                entries.remove(&oldest);
            }
        }
        entries.insert(key, CacheEntry::new(data, ttl));
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
