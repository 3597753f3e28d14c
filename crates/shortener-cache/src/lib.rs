//! Query result cache for the URL shortener
//!
//! Sits between request handlers and the backing store and caches read
//! results in memory.
//!
//! # Features
//!
//! - **LRU Eviction**: Least recently used entries are evicted when capacity is reached
//! - **TTL Support**: Per-entry time-to-live, enforced lazily on access
//! - **Dependency Invalidation**: Results are recorded against the tables they read,
//!   and a write to a table drops exactly those results
//! - **Tags**: Explicit invalidation groups independent of tables
//! - **Thread-Safe**: One `RwLock` guards the store and the dependency index together
//! - **Statistics**: Track hits, misses, evictions, expirations and invalidations
//! - **Background Sweep**: Optional tokio task reclaiming expired entries
//!
//! # Example
//!
//! ```ignore
//! use shortener_cache::{CacheConfig, CacheInvalidator, CacheKey, QueryCache, ReadOptions};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(QueryCache::new(CacheConfig::new(5000, 1000))?);
//!
//! // Read path
//! let key = CacheKey::from_query("links_by_domain", &domain_id);
//! let options = ReadOptions::new().with_resources(["links", "domains"]);
//! let links = cache.read(key, &options, || db.links_by_domain(domain_id)).await?;
//!
//! // Write path: invalidate after commit, before acknowledging
//! db.insert_link(link).await?;
//! let invalidator: Arc<dyn CacheInvalidator> = cache.clone();
//! invalidator.invalidate(&["links"], &[]);
//! ```

pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod invalidation;
pub mod key;
pub mod stats;
pub mod store;
mod sweeper;

pub use cache::{QueryCache, ReadOptions};
pub use config::{CacheConfig, CacheSettings};
pub use dependency::DependencyIndex;
pub use error::{CacheError, Result};
pub use invalidation::{CacheInvalidator, InvalidationEvent, NoOpInvalidator};
pub use key::CacheKey;
pub use stats::CacheStats;
pub use store::{CacheEntry, Lookup, PutOutcome, ResultStore};
