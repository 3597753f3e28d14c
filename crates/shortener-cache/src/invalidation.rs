//! Write-path invalidation
//!
//! The mutation layer holds an `Arc<dyn CacheInvalidator>` and calls it
//! after a write commits, before reporting success to its own caller.

/// A handle that can drop cached results after a write
pub trait CacheInvalidator: Send + Sync {
    /// Drop every result derived from `resources` or grouped under `tags`,
    /// returning how many cached entries were removed
    fn invalidate(&self, resources: &[&str], tags: &[&str]) -> usize;

    /// Drop every cached result
    fn invalidate_all(&self) -> usize;

    fn is_enabled(&self) -> bool;
}

/// Invalidator for a write path whose reads are not cached
#[derive(Debug, Default, Clone)]
pub struct NoOpInvalidator;

impl CacheInvalidator for NoOpInvalidator {
    fn invalidate(&self, _resources: &[&str], _tags: &[&str]) -> usize {
        0
    }

    fn invalidate_all(&self) -> usize {
        0
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// A change reported by the mutation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// Rows of a resource (table) were inserted, updated or deleted
    Resource(String),
    /// An explicit invalidation group was touched
    Tag(String),
    /// Everything cached may be stale
    All,
}

impl InvalidationEvent {
    pub fn resource(name: impl Into<String>) -> Self {
        Self::Resource(name.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::Tag(name.into())
    }

    /// Deliver this event to an invalidator
    pub fn dispatch(&self, invalidator: &dyn CacheInvalidator) -> usize {
        match self {
            Self::Resource(name) => invalidator.invalidate(&[name.as_str()], &[]),
            Self::Tag(name) => invalidator.invalidate(&[], &[name.as_str()]),
            Self::All => invalidator.invalidate_all(),
        }
    }
}
