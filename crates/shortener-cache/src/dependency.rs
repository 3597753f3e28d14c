//! Dependency tracking
//!
//! Maps logical resources (tables) and explicit tags to the cache keys whose
//! values were derived from them, so a write can fan out to exactly the
//! cached results it made stale.
//!
//! The index also versions invalidations. A read that misses takes a
//! snapshot with [`begin_read`](DependencyIndex::begin_read) before it
//! computes, and may only store its result if none of its resources, tags or
//! its own key were invalidated since ([`is_current`](DependencyIndex::is_current)).

use crate::key::CacheKey;
use ahash::{AHashMap, AHashSet};

/// Names a key is recorded under
#[derive(Debug, Default)]
struct Membership {
    resources: AHashSet<String>,
    tags: AHashSet<String>,
}

/// Resource and tag fan-out sets
///
/// Every key in the index also has a reverse [`Membership`] entry, so a key
/// leaving the result store can be dropped from all of its sets with
/// [`forget`](Self::forget).
#[derive(Debug, Default)]
pub struct DependencyIndex {
    resources: AHashMap<String, AHashSet<CacheKey>>,
    tags: AHashMap<String, AHashSet<CacheKey>>,
    members: AHashMap<CacheKey, Membership>,
    /// Bumped by every invalidation and clear
    version: u64,
    /// Version of the last clear
    cleared_at: u64,
    /// Versions of invalidations made while reads were in flight
    resource_versions: AHashMap<String, u64>,
    tag_versions: AHashMap<String, u64>,
    /// Reads between `begin_read` and `end_read`
    readers: usize,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `key` was computed from `resource`. Idempotent.
    pub fn record(&mut self, resource: &str, key: &CacheKey) {
        insert_member(&mut self.resources, resource, key);
        self.members
            .entry(key.clone())
            .or_default()
            .resources
            .insert(resource.to_string());
    }

    /// Record that `key` belongs to the invalidation group `tag`
    pub fn tag(&mut self, tag: &str, key: &CacheKey) {
        insert_member(&mut self.tags, tag, key);
        self.members
            .entry(key.clone())
            .or_default()
            .tags
            .insert(tag.to_string());
    }

    /// Take the full dependent set of `resource`, leaving it empty
    ///
    /// The keys stay recorded under their other resources and tags. The
    /// caller deletes them from the result store and decides whether to
    /// [`forget`](Self::forget) them.
    pub fn invalidate_resource(&mut self, resource: &str) -> AHashSet<CacheKey> {
        let version = self.bump();
        if self.readers > 0 {
            self.resource_versions.insert(resource.to_string(), version);
        }

        let keys = self.resources.remove(resource).unwrap_or_default();
        for key in &keys {
            if let Some(membership) = self.members.get_mut(key) {
                membership.resources.remove(resource);
            }
        }
        keys
    }

    /// Take every key stored under `tag`
    ///
    /// A tag also names the entry whose key is the tag itself; a read of
    /// that key in flight is treated as invalidated too.
    pub fn invalidate_tag(&mut self, tag: &str) -> AHashSet<CacheKey> {
        let version = self.bump();
        if self.readers > 0 {
            self.tag_versions.insert(tag.to_string(), version);
        }

        let keys = self.tags.remove(tag).unwrap_or_default();
        for key in &keys {
            if let Some(membership) = self.members.get_mut(key) {
                membership.tags.remove(tag);
            }
        }
        keys
    }

    /// Drop `key` from every set it is recorded in
    pub fn forget(&mut self, key: &str) {
        let Some(membership) = self.members.remove(key) else {
            return;
        };
        for resource in &membership.resources {
            remove_member(&mut self.resources, resource, key);
        }
        for tag in &membership.tags {
            remove_member(&mut self.tags, tag, key);
        }
    }

    /// Start a read that will compute its value outside the lock,
    /// returning the version it must be checked against
    pub fn begin_read(&mut self) -> u64 {
        self.readers += 1;
        self.version
    }

    /// Finish a read started with [`begin_read`](Self::begin_read)
    pub fn end_read(&mut self) {
        self.readers = self.readers.saturating_sub(1);
        if self.readers == 0 {
            self.resource_versions.clear();
            self.tag_versions.clear();
        }
    }

    /// Whether a value computed since `since` for `key` is still valid
    pub fn is_current(
        &self,
        since: u64,
        key: &CacheKey,
        resources: &[String],
        tags: &[String],
    ) -> bool {
        let changed = |versions: &AHashMap<String, u64>, name: &str| {
            versions.get(name).is_some_and(|&version| version > since)
        };

        self.cleared_at <= since
            && !changed(&self.tag_versions, key.as_str())
            && !resources.iter().any(|r| changed(&self.resource_versions, r.as_str()))
            && !tags.iter().any(|t| changed(&self.tag_versions, t.as_str()))
    }

    /// Drop all memberships; reads in flight are invalidated
    pub fn clear(&mut self) {
        self.cleared_at = self.bump();
        self.resources.clear();
        self.tags.clear();
        self.members.clear();
    }

    /// Keys currently recorded against a resource
    pub fn dependents(&self, resource: &str) -> Option<&AHashSet<CacheKey>> {
        self.resources.get(resource)
    }

    /// Number of resources with at least one recorded dependent
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of tags with at least one recorded key
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Number of distinct keys recorded under any resource or tag
    pub fn key_count(&self) -> usize {
        self.members.len()
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

fn insert_member(sets: &mut AHashMap<String, AHashSet<CacheKey>>, name: &str, key: &CacheKey) {
    match sets.get_mut(name) {
        Some(keys) => {
            keys.insert(key.clone());
        }
        None => {
            let mut keys = AHashSet::new();
            keys.insert(key.clone());
            sets.insert(name.to_string(), keys);
        }
    }
}

fn remove_member(sets: &mut AHashMap<String, AHashSet<CacheKey>>, name: &str, key: &str) {
    if let Some(keys) = sets.get_mut(name) {
        keys.remove(key);
        if keys.is_empty() {
            sets.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> CacheKey {
        CacheKey::from(name)
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut index = DependencyIndex::new();
        index.record("links", &key("q1"));
        index.record("links", &key("q1"));

        assert_eq!(index.dependents("links").unwrap().len(), 1);
        assert_eq!(index.key_count(), 1);
    }

    #[test]
    fn test_invalidate_resource_takes_set() {
        let mut index = DependencyIndex::new();
        index.record("links", &key("q1"));
        index.record("links", &key("q2"));
        index.record("domains", &key("q3"));

        let removed = index.invalidate_resource("links");
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&key("q1")));
        assert!(removed.contains(&key("q2")));

        assert!(index.dependents("links").is_none());
        assert_eq!(index.dependents("domains").unwrap().len(), 1);
    }

    #[test]
    fn test_invalidate_twice_returns_nothing() {
        let mut index = DependencyIndex::new();
        index.record("links", &key("q1"));

        assert_eq!(index.invalidate_resource("links").len(), 1);
        assert!(index.invalidate_resource("links").is_empty());
        assert!(index.invalidate_resource("never-recorded").is_empty());
    }

    #[test]
    fn test_other_memberships_kept_until_forgotten() {
        let mut index = DependencyIndex::new();
        index.record("links", &key("join"));
        index.record("domains", &key("join"));

        index.invalidate_resource("links");
        assert!(index.dependents("domains").unwrap().contains(&key("join")));

        index.forget("join");
        assert!(index.dependents("domains").is_none());
        assert_eq!(index.key_count(), 0);
    }

    #[test]
    fn test_tags_independent_of_resources() {
        let mut index = DependencyIndex::new();
        index.record("links", &key("q1"));
        index.tag("home", &key("q1"));
        index.tag("home", &key("q2"));

        let removed = index.invalidate_tag("home");
        assert_eq!(removed.len(), 2);
        assert_eq!(index.tag_count(), 0);
        assert_eq!(index.resource_count(), 1);
    }

    #[test]
    fn test_forget_drops_every_membership() {
        let mut index = DependencyIndex::new();
        index.record("links", &key("gone"));
        index.record("domains", &key("gone"));
        index.tag("home", &key("gone"));
        index.record("links", &key("alive"));

        index.forget("gone");
        index.forget("never-recorded");

        assert_eq!(index.resource_count(), 1);
        assert_eq!(index.tag_count(), 0);
        assert_eq!(index.key_count(), 1);
        assert!(index.dependents("links").unwrap().contains(&key("alive")));
    }

    #[test]
    fn test_read_invalidated_while_in_flight() {
        let mut index = DependencyIndex::new();
        let since = index.begin_read();

        index.invalidate_resource("links");

        let q = key("q");
        assert!(!index.is_current(since, &q, &names(&["links"]), &[]));
        assert!(index.is_current(since, &q, &names(&["domains"]), &[]));
        index.end_read();
    }

    #[test]
    fn test_read_started_after_invalidation_is_current() {
        let mut index = DependencyIndex::new();
        index.invalidate_resource("links");

        let since = index.begin_read();
        assert!(index.is_current(since, &key("q"), &names(&["links"]), &[]));
        index.end_read();
    }

    #[test]
    fn test_tag_invalidation_covers_key_and_group() {
        let mut index = DependencyIndex::new();
        let since = index.begin_read();

        index.invalidate_tag("homepage");

        assert!(!index.is_current(since, &key("homepage"), &[], &[]));
        assert!(!index.is_current(since, &key("q"), &[], &names(&["homepage"])));
        assert!(index.is_current(since, &key("q"), &[], &names(&["footer"])));
        index.end_read();
    }

    #[test]
    fn test_clear_invalidates_reads_in_flight() {
        let mut index = DependencyIndex::new();
        let since = index.begin_read();
        index.clear();

        assert!(!index.is_current(since, &key("q"), &[], &[]));
        index.end_read();
    }

    #[test]
    fn test_versions_dropped_when_no_reads_in_flight() {
        let mut index = DependencyIndex::new();

        // Nothing in flight: nothing to remember
        index.invalidate_resource("links");
        assert!(index.resource_versions.is_empty());

        index.begin_read();
        index.invalidate_tag("t");
        assert_eq!(index.tag_versions.len(), 1);
        index.end_read();
        assert!(index.tag_versions.is_empty());
    }
}
