//! Result store: bounded LRU storage with per-entry TTL
//!
//! The store is a plain data structure. It is not synchronized and never
//! reads the clock itself; the owning [`QueryCache`](crate::QueryCache)
//! passes the current instant in and serializes access.

use crate::key::CacheKey;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for expiry instants when `now + ttl` would overflow
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Entry stored in the cache
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached query result
    pub value: V,
    /// The entry is logically absent from this instant on
    pub expires_at: Instant,
    /// Number of times this entry was served
    pub hit_count: u64,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration, now: Instant) -> Self {
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            value,
            expires_at,
            hit_count: 0,
        }
    }

    /// A zero TTL makes the entry expired at the instant it was written.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Result of a store lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    /// The key was present but past its expiry and has been removed
    Expired,
    Miss,
}

impl<V> Lookup<V> {
    pub fn into_value(self) -> Option<V> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired | Lookup::Miss => None,
        }
    }
}

/// What happened to the store on a put
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Replaced,
    /// A new key was inserted and the least recently used one made room
    Evicted(CacheKey),
}

/// Bounded key/value store with LRU and TTL eviction
#[derive(Debug)]
pub struct ResultStore<V> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
}

impl<V: Clone> ResultStore<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a key, bumping its recency on a hit
    ///
    /// Expired entries are removed here rather than by a timer.
    pub fn get(&mut self, key: &str, now: Instant) -> Lookup<V> {
        let expired = match self.entries.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => return Lookup::Miss,
        };

        if expired {
            self.entries.pop(key);
            return Lookup::Expired;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.hit_count += 1;
                Lookup::Hit(entry.value.clone())
            }
            None => Lookup::Miss,
        }
    }

    /// Insert or replace an entry and mark it most recently used
    ///
    /// Inserting a new key into a full store evicts the least recently used
    /// entry first, whatever its remaining TTL.
    pub fn put(&mut self, key: CacheKey, value: V, ttl: Duration, now: Instant) -> PutOutcome {
        let entry = CacheEntry::new(value, ttl, now);

        if self.entries.contains(key.as_str()) {
            self.entries.put(key, entry);
            return PutOutcome::Replaced;
        }

        let evicted = if self.entries.len() >= self.entries.cap().get() {
            self.entries.pop_lru().map(|(evicted, _)| evicted)
        } else {
            None
        };

        self.entries.put(key, entry);

        match evicted {
            Some(evicted) => PutOutcome::Evicted(evicted),
            None => PutOutcome::Inserted,
        }
    }

    /// Remove an entry; absent keys are not an error
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Check for a live entry without touching recency
    pub fn contains(&self, key: &str, now: Instant) -> bool {
        self.entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Peek at an entry without touching recency or expiring it
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.peek(key)
    }

    /// Remove every expired entry, returning the removed keys
    pub fn expire(&mut self, now: Instant) -> Vec<CacheKey> {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key.as_str());
        }

        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
