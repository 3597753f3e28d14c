//! Cache keys
//!
//! A key identifies one read operation together with its bound parameters.
//! Callers may supply their own stable string or derive one with
//! [`CacheKey::from_query`].

use ahash::AHasher;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Opaque identity of a cached read
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-unique key string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from an operation name and its parameters
    ///
    /// The same `(operation, params)` pair always produces the same key
    /// within a process; distinct parameters produce distinct keys.
    pub fn from_query<P: Hash + ?Sized>(operation: &str, params: &P) -> Self {
        let mut hasher = AHasher::default();
        operation.hash(&mut hasher);
        params.hash(&mut hasher);
        Self(format!("{}:{:016x}", operation, hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_is_deterministic() {
        let key1 = CacheKey::from_query("links_by_domain", &(1_u64, "active"));
        let key2 = CacheKey::from_query("links_by_domain", &(1_u64, "active"));
        let key3 = CacheKey::from_query("links_by_domain", &(2_u64, "active"));
        let key4 = CacheKey::from_query("domains", &(1_u64, "active"));

        // Same operation and params should produce same key
        assert_eq!(key1, key2);
        // Different params should produce different key
        assert_ne!(key1, key3);
        // Different operation should produce different key
        assert_ne!(key1, key4);
    }

    #[test]
    fn test_from_query_keeps_operation_prefix() {
        let key = CacheKey::from_query("links_by_domain", &[1_u64]);
        assert!(key.as_str().starts_with("links_by_domain:"));
    }

    #[test]
    fn test_verbatim_key() {
        let key = CacheKey::from("q:domains");
        assert_eq!(key.as_str(), "q:domains");
        assert_eq!(key.to_string(), "q:domains");
        assert_eq!(key, CacheKey::new(String::from("q:domains")));
    }
}
