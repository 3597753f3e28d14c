//! Query cache façade
//!
//! [`QueryCache`] owns the result store and the dependency index behind one
//! lock, so a reader never sees a key the index has already given up on, and
//! every key in the index is present in the store.
//!
//! Two concurrent misses on the same key both run their computation and the
//! later `put` wins; computations are expected to be side-effect free reads,
//! so the cache does not coordinate them. A computation that was overtaken by
//! an invalidation of one of its resources or tags is returned to its caller
//! but not stored.

use crate::config::CacheConfig;
use crate::dependency::DependencyIndex;
use crate::error::Result;
use crate::invalidation::CacheInvalidator;
use crate::key::CacheKey;
use crate::stats::CacheStats;
use crate::store::{Lookup, PutOutcome, ResultStore};
use parking_lot::RwLock;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// How a read is cached: what it depends on and how long it lives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    resources: Vec<String>,
    tags: Vec<String>,
    ttl: Option<Duration>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources (tables) the read depends on
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources.extend(resources.into_iter().map(Into::into));
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }

    /// Explicit invalidation groups the result belongs to
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Override the cache-wide TTL. Zero means the result expires at once.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_ttl_millis(self, millis: u64) -> Self {
        self.with_ttl(Duration::from_millis(millis))
    }

    pub fn with_ttl_secs(self, secs: u64) -> Self {
        self.with_ttl(Duration::from_secs(secs))
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

struct CacheState<V> {
    store: ResultStore<V>,
    index: DependencyIndex,
}

impl<V: Clone> CacheState<V> {
    fn insert(
        &mut self,
        key: CacheKey,
        value: V,
        ttl: Duration,
        options: &ReadOptions,
    ) -> Option<CacheKey> {
        let evicted = match self.store.put(key.clone(), value, ttl, Instant::now()) {
            PutOutcome::Evicted(evicted) => {
                self.index.forget(evicted.as_str());
                Some(evicted)
            }
            PutOutcome::Inserted | PutOutcome::Replaced => None,
        };

        for resource in &options.resources {
            self.index.record(resource, &key);
        }
        for tag in &options.tags {
            self.index.tag(tag, &key);
        }
        evicted
    }

    fn remove(&mut self, key: &str) -> bool {
        self.index.forget(key);
        self.store.delete(key)
    }
}

/// A miss whose value is being computed outside the lock
///
/// Dropping it (including when the read future is cancelled) ends the read
/// in the dependency index.
struct PendingRead<'a, V: Clone> {
    cache: &'a QueryCache<V>,
    since: u64,
}

impl<V: Clone> Drop for PendingRead<'_, V> {
    fn drop(&mut self) {
        self.cache.state.write().index.end_read();
    }
}

/// Thread-safe query result cache with dependency invalidation
pub struct QueryCache<V> {
    state: RwLock<CacheState<V>>,
    config: CacheConfig,
    stats: Arc<CacheStats>,
}

impl<V: Clone> QueryCache<V> {
    /// Create a new query cache, rejecting an invalid configuration
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Ok(Self::with_capacity(config, capacity))
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        let config = CacheConfig::default();
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self::with_capacity(config, capacity)
    }

    fn with_capacity(config: CacheConfig, capacity: NonZeroUsize) -> Self {
        Self {
            state: RwLock::new(CacheState {
                store: ResultStore::new(capacity),
                index: DependencyIndex::new(),
            }),
            config,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Read through the cache
    ///
    /// On a hit the cached value is returned. On a miss `compute` runs with
    /// no lock held. A successful result is stored and recorded against every
    /// resource and tag in `options`, unless one of them (or the key, as a
    /// tag) was invalidated while it ran. A failed computation is returned
    /// as is and nothing is cached.
    pub async fn read<K, F, Fut, E>(
        &self,
        key: K,
        options: &ReadOptions,
        compute: F,
    ) -> std::result::Result<V, E>
    where
        K: Into<CacheKey>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let key = key.into();

        if !self.config.enabled {
            let result = compute().await;
            self.stats.record_computation(result.is_ok());
            return result;
        }

        let pending = match self.lookup(key.as_str(), true) {
            (Some(value), _) => return Ok(value),
            (None, since) => PendingRead { cache: self, since },
        };

        let result = compute().await;
        self.stats.record_computation(result.is_ok());

        match result {
            Ok(value) => {
                self.put_if_current(key, value.clone(), options, pending.since);
                Ok(value)
            }
            Err(err) => {
                debug!("Computation for {} failed, nothing cached", key);
                Err(err)
            }
        }
    }

    /// Get an entry from the cache
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.config.enabled {
            return None;
        }
        self.lookup(key, false).0
    }

    /// Look a key up; on a miss with `begin_read` set, register a pending
    /// read in the same critical section and return its version
    fn lookup(&self, key: &str, begin_read: bool) -> (Option<V>, u64) {
        let (lookup, since) = {
            let mut state = self.state.write();
            let lookup = state.store.get(key, Instant::now());
            if matches!(lookup, Lookup::Expired) {
                state.index.forget(key);
                self.stats.set_entry_count(state.store.len() as u64);
            }

            let since = match (&lookup, begin_read) {
                (Lookup::Hit(_), _) | (_, false) => 0,
                (_, true) => state.index.begin_read(),
            };
            (lookup, since)
        };

        match lookup {
            Lookup::Hit(value) => {
                trace!("Cache HIT for {}", key);
                self.stats.record_hit();
                (Some(value), since)
            }
            Lookup::Expired => {
                debug!("Cache entry {} expired", key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                (None, since)
            }
            Lookup::Miss => {
                debug!("Cache MISS for {}", key);
                self.stats.record_miss();
                (None, since)
            }
        }
    }

    fn put_if_current(&self, key: CacheKey, value: V, options: &ReadOptions, since: u64) {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);

        let evicted = {
            let mut state = self.state.write();
            if !state
                .index
                .is_current(since, &key, &options.resources, &options.tags)
            {
                debug!("Not caching {}: invalidated while computing", key);
                return;
            }
            let evicted = state.insert(key.clone(), value, ttl, options);
            self.stats.set_entry_count(state.store.len() as u64);
            evicted
        };

        if let Some(evicted) = evicted {
            debug!("Evicted {} to make room for {}", evicted, key);
            self.stats.record_eviction();
        }
    }

    /// Insert an entry and record its dependencies
    pub fn put(&self, key: impl Into<CacheKey>, value: V, options: &ReadOptions) {
        if !self.config.enabled {
            return;
        }

        let key = key.into();
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);

        let evicted = {
            let mut state = self.state.write();
            let evicted = state.insert(key.clone(), value, ttl, options);
            self.stats.set_entry_count(state.store.len() as u64);
            evicted
        };

        if let Some(evicted) = evicted {
            debug!("Evicted {} to make room for {}", evicted, key);
            self.stats.record_eviction();
        }
    }

    /// Invalidate every cached result derived from `resources` or stored
    /// under `tags`, including an entry whose key is the tag itself
    ///
    /// All affected entries are gone from the store when this returns, and
    /// reads that were computing when it ran will not store their results.
    /// Returns how many entries were removed; unknown names remove nothing.
    pub fn invalidate(&self, resources: &[&str], tags: &[&str]) -> usize {
        let removed = {
            let mut state = self.state.write();

            let mut removed = 0;
            for resource in resources {
                for key in state.index.invalidate_resource(resource) {
                    if state.remove(key.as_str()) {
                        removed += 1;
                    }
                }
            }
            for tag in tags {
                for key in state.index.invalidate_tag(tag) {
                    if state.remove(key.as_str()) {
                        removed += 1;
                    }
                }
                if state.remove(tag) {
                    removed += 1;
                }
            }
            self.stats.set_entry_count(state.store.len() as u64);
            removed
        };

        debug!(
            "Invalidated {} entries for resources {:?} and tags {:?}",
            removed, resources, tags
        );
        self.stats.record_invalidations(removed as u64);
        removed
    }

    /// Invalidate everything derived from one resource
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        self.invalidate(&[resource], &[])
    }

    /// Invalidate everything stored under one tag
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.invalidate(&[], &[tag])
    }

    /// Remove a single entry from the cache
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.write();
        let removed = state.remove(key);
        self.stats.set_entry_count(state.store.len() as u64);
        removed
    }

    /// Clear all entries and dependency records, returning the number of
    /// entries dropped
    pub fn clear(&self) -> usize {
        let cleared = {
            let mut state = self.state.write();
            let cleared = state.store.len();
            state.store.clear();
            state.index.clear();
            self.stats.set_entry_count(0);
            cleared
        };

        debug!("Cleared {} cache entries", cleared);
        cleared
    }

    /// Expire entries that have exceeded their TTL
    pub fn expire_stale(&self) -> usize {
        let expired = {
            let mut state = self.state.write();
            let expired = state.store.expire(Instant::now());
            for key in &expired {
                state.index.forget(key.as_str());
            }
            self.stats.set_entry_count(state.store.len() as u64);
            expired.len()
        };

        if expired > 0 {
            debug!("Expired {} cache entries", expired);
        }
        self.stats.record_expirations(expired as u64);
        expired
    }

    /// Check for a live entry without affecting its recency
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().store.contains(key, Instant::now())
    }

    /// Get current number of stored entries, including expired ones not
    /// yet reclaimed
    pub fn len(&self) -> usize {
        self.state.read().store.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.state.read().store.is_empty()
    }

    /// Number of resources with tracked dependents
    pub fn tracked_resources(&self) -> usize {
        self.state.read().index.resource_count()
    }

    /// Number of keys recorded in the dependency index
    pub fn tracked_keys(&self) -> usize {
        self.state.read().index.key_count()
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<V: Clone + Send + Sync> CacheInvalidator for QueryCache<V> {
    fn invalidate(&self, resources: &[&str], tags: &[&str]) -> usize {
        QueryCache::invalidate(self, resources, tags)
    }

    fn invalidate_all(&self) -> usize {
        self.clear()
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

impl<V: Clone> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("QueryCache")
            .field("enabled", &self.config.enabled)
            .field("max_entries", &self.config.max_entries)
            .field("default_ttl", &self.config.default_ttl)
            .field("current_entries", &state.store.len())
            .field("tracked_keys", &state.index.key_count())
            .finish()
    }
}
