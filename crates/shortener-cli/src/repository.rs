//! Cached repository
//!
//! Wraps an in-memory domains/links database with the query cache. Reads go
//! through [`QueryCache::read`] tagged with the tables they touch; writes
//! commit first and report those tables to a [`CacheInvalidator`] before
//! returning.

use parking_lot::RwLock;
use serde::Serialize;
use shortener_cache::{
    CacheConfig, CacheInvalidator, CacheKey, CacheStats, InvalidationEvent, NoOpInvalidator,
    QueryCache, ReadOptions,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const DOMAINS: &str = "domains";
pub const LINKS: &str = "links";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Domain is disabled: {0}")]
    DomainDisabled(String),

    #[error("Slug already exists on domain {domain_id}: {slug}")]
    DuplicateSlug { domain_id: u64, slug: String },

    #[error("Unexpected cached result for {0}")]
    UnexpectedResult(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    pub id: u64,
    pub domain: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub id: u64,
    pub domain_id: u64,
    pub slug: String,
    pub url: String,
}

/// Rows returned by a cached read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Domain(Option<Domain>),
    Domains(Vec<Domain>),
    Links(Vec<Link>),
    Url(Option<String>),
}

/// In-memory stand-in for the backing store
#[derive(Debug, Default)]
pub struct Database {
    domains: RwLock<Vec<Domain>>,
    links: RwLock<Vec<Link>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_domain(&self, domain: &str) -> Domain {
        let mut domains = self.domains.write();
        let row = Domain {
            id: domains.len() as u64 + 1,
            domain: domain.to_lowercase(),
            enabled: true,
        };
        domains.push(row.clone());
        row
    }

    fn set_domain_enabled(&self, domain_id: u64, enabled: bool) -> Result<()> {
        let mut domains = self.domains.write();
        let row = domains
            .iter_mut()
            .find(|d| d.id == domain_id)
            .ok_or_else(|| RepositoryError::DomainNotFound(domain_id.to_string()))?;
        row.enabled = enabled;
        Ok(())
    }

    fn insert_link(&self, domain_id: u64, slug: &str, url: &str) -> Result<Link> {
        let mut links = self.links.write();
        if links.iter().any(|l| l.domain_id == domain_id && l.slug == slug) {
            return Err(RepositoryError::DuplicateSlug {
                domain_id,
                slug: slug.to_string(),
            });
        }
        let row = Link {
            id: links.len() as u64 + 1,
            domain_id,
            slug: slug.to_string(),
            url: url.to_string(),
        };
        links.push(row.clone());
        Ok(row)
    }

    fn domain_by_name(&self, domain: &str) -> Option<Domain> {
        let domain = domain.to_lowercase();
        self.domains.read().iter().find(|d| d.domain == domain).cloned()
    }

    fn all_domains(&self) -> Vec<Domain> {
        self.domains.read().clone()
    }

    fn links_by_domain(&self, domain_id: u64) -> Vec<Link> {
        self.links
            .read()
            .iter()
            .filter(|l| l.domain_id == domain_id)
            .cloned()
            .collect()
    }

    /// Redirect lookup: joins links with their (enabled) domain
    fn redirect(&self, domain_id: u64, slug: &str) -> Option<String> {
        let enabled = self
            .domains
            .read()
            .iter()
            .any(|d| d.id == domain_id && d.enabled);
        if !enabled {
            return None;
        }
        self.links
            .read()
            .iter()
            .find(|l| l.domain_id == domain_id && l.slug == slug)
            .map(|l| l.url.clone())
    }
}

/// A repository with built-in caching support
pub struct CachedRepository {
    /// The underlying store
    db: Database,
    /// The query cache
    cache: Arc<QueryCache<QueryResult>>,
    /// Write-path handle; the cache itself unless caching is disabled
    invalidator: Arc<dyn CacheInvalidator>,
}

impl CachedRepository {
    /// Create a new cached repository with the given cache configuration
    pub fn new(config: CacheConfig) -> shortener_cache::Result<Self> {
        Ok(Self::with_cache(Arc::new(QueryCache::new(config)?)))
    }

    /// Create a cached repository with a shared cache
    pub fn with_cache(cache: Arc<QueryCache<QueryResult>>) -> Self {
        let invalidator: Arc<dyn CacheInvalidator> = if cache.is_enabled() {
            cache.clone()
        } else {
            Arc::new(NoOpInvalidator)
        };
        Self {
            db: Database::new(),
            cache,
            invalidator,
        }
    }

    pub async fn domain_by_name(&self, domain: &str) -> Result<Option<Domain>> {
        let key = CacheKey::from_query("domain_by_name", domain);
        let options = ReadOptions::new().with_resource(DOMAINS);
        let result = self
            .cache
            .read(key, &options, || async {
                Ok::<_, RepositoryError>(QueryResult::Domain(
                    self.db.domain_by_name(domain),
                ))
            })
            .await?;

        match result {
            QueryResult::Domain(domain) => Ok(domain),
            _ => Err(RepositoryError::UnexpectedResult("domain_by_name".into())),
        }
    }

    pub async fn all_domains(&self) -> Result<Vec<Domain>> {
        let options = ReadOptions::new().with_resource(DOMAINS);
        let result = self
            .cache
            .read("q:domains", &options, || async {
                Ok::<_, RepositoryError>(QueryResult::Domains(
                    self.db.all_domains(),
                ))
            })
            .await?;

        match result {
            QueryResult::Domains(domains) => Ok(domains),
            _ => Err(RepositoryError::UnexpectedResult("q:domains".into())),
        }
    }

    /// Links of an enabled domain
    pub async fn links_by_domain(&self, domain: &str) -> Result<Vec<Link>> {
        let row = self
            .domain_by_name(domain)
            .await?
            .ok_or_else(|| RepositoryError::DomainNotFound(domain.to_string()))?;
        if !row.enabled {
            return Err(RepositoryError::DomainDisabled(domain.to_string()));
        }

        let key = format!("q:links:domains={}", row.id);
        let options = ReadOptions::new().with_resources([LINKS, DOMAINS]);
        let result = self
            .cache
            .read(key.as_str(), &options, || async {
                Ok::<_, RepositoryError>(QueryResult::Links(
                    self.db.links_by_domain(row.id),
                ))
            })
            .await?;

        match result {
            QueryResult::Links(links) => Ok(links),
            _ => Err(RepositoryError::UnexpectedResult(key)),
        }
    }

    pub async fn redirect(&self, domain_id: u64, slug: &str) -> Result<Option<String>> {
        let key = CacheKey::from_query("redirect_by_domain_slug", &(domain_id, slug));
        let options = ReadOptions::new().with_resources([LINKS, DOMAINS]);
        let result = self
            .cache
            .read(key, &options, || async {
                Ok::<_, RepositoryError>(QueryResult::Url(
                    self.db.redirect(domain_id, slug),
                ))
            })
            .await?;

        match result {
            QueryResult::Url(url) => Ok(url),
            _ => Err(RepositoryError::UnexpectedResult("redirect_by_domain_slug".into())),
        }
    }

    pub fn create_domain(&self, domain: &str) -> Domain {
        let row = self.db.insert_domain(domain);
        self.notify(InvalidationEvent::resource(DOMAINS));
        info!("Created domain '{}' (id={})", row.domain, row.id);
        row
    }

    pub fn set_domain_enabled(&self, domain_id: u64, enabled: bool) -> Result<()> {
        self.db.set_domain_enabled(domain_id, enabled)?;
        self.notify(InvalidationEvent::resource(DOMAINS));
        Ok(())
    }

    pub fn create_link(&self, domain_id: u64, slug: &str, url: &str) -> Result<Link> {
        let row = self.db.insert_link(domain_id, slug, url)?;
        self.notify(InvalidationEvent::resource(LINKS));
        info!("Created link '{}' -> {}", row.slug, row.url);
        Ok(row)
    }

    /// Report a committed change, returning how many cached entries it dropped
    pub fn notify(&self, event: InvalidationEvent) -> usize {
        let removed = event.dispatch(self.invalidator.as_ref());
        debug!("{:?} dropped {} cached entries", event, removed);
        removed
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }

    /// Get the underlying cache
    pub fn cache(&self) -> &Arc<QueryCache<QueryResult>> {
        &self.cache
    }
}
