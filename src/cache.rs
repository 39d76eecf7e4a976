//! # TTL cache
//! In-memory, process-wide cache shared by the fact-check and categorization
//! paths. Entries older than the TTL read as absent; when the soft capacity is
//! reached, the oldest batch of entries (by store time) is evicted.
//!
//! All methods take `&self`; reads, evictions and writes are serialized by one
//! mutex. Methods with an `_at` suffix take an explicit clock for tests.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub const DEFAULT_TTL_MINS: i64 = 30;
pub const DEFAULT_CAPACITY: usize = 500;
pub const DEFAULT_EVICT_BATCH: usize = 100;

/// Cached value plus the time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry<T> {
    pub data: T,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    inner: Mutex<HashMap<K, CachedEntry<V>>>,
    ttl: Duration,
    capacity: usize,
    evict_batch: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, capacity: usize, evict_batch: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            evict_batch: evict_batch.max(1),
        }
    }

    /// 30 minutes, 500 entries, evict 100.
    pub fn with_defaults() -> Self {
        Self::new(
            Duration::minutes(DEFAULT_TTL_MINS),
            DEFAULT_CAPACITY,
            DEFAULT_EVICT_BATCH,
        )
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let mut map = self.inner.lock();
        let expired = match map.get(key) {
            None => return None,
            Some(e) => now - e.stored_at > self.ttl,
        };
        if expired {
            map.remove(key);
            return None;
        }
        map.get(key).map(|e| e.data.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Utc::now())
    }

    pub fn insert_at(&self, key: K, value: V, now: DateTime<Utc>) {
        let mut map = self.inner.lock();
        if !map.contains_key(&key) && map.len() >= self.capacity {
            let ttl = self.ttl;
            map.retain(|_, e| now - e.stored_at <= ttl);
            if map.len() >= self.capacity {
                let mut by_age: Vec<(K, DateTime<Utc>)> =
                    map.iter().map(|(k, e)| (k.clone(), e.stored_at)).collect();
                by_age.sort_by_key(|(_, t)| *t);
                for (k, _) in by_age.into_iter().take(self.evict_batch) {
                    map.remove(&k);
                }
            }
        }
        map.insert(
            key,
            CachedEntry {
                data: value,
                stored_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
