use crate::repository::{CachedRepository, DOMAINS, LINKS};
use anyhow::Result;
use colored::Colorize;
use shortener_cache::{CacheConfig, CacheSettings, CacheStats, InvalidationEvent, QueryCache};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Walk through LRU eviction and table invalidation with a two-entry cache
pub async fn run_demo(config: CacheConfig) -> Result<()> {
    let config = config.with_max_entries(2).with_ttl(Duration::from_millis(1000));
    println!(
        "{} Cache: capacity={}, ttl={:?}",
        "→".bright_blue(),
        config.max_entries,
        config.default_ttl
    );

    let repo = CachedRepository::new(config)?;
    let first = repo.create_domain("sho.rt");
    let second = repo.create_domain("lnk.to");
    repo.create_link(first.id, "docs", "https://docs.rs")?;
    repo.create_link(second.id, "crates", "https://crates.io")?;

    let domains = repo.all_domains().await?;
    step("q:domains", &format!("{} domains", domains.len()), repo.cache());

    // Each listing also caches its domain_by_name lookup, so with two slots
    // every new read pushes out the oldest entry
    let links = repo.links_by_domain("sho.rt").await?;
    step("q:links:domains=1", &format!("{} links", links.len()), repo.cache());

    let links = repo.links_by_domain("lnk.to").await?;
    step("q:links:domains=2", &format!("{} links", links.len()), repo.cache());

    println!(
        "{} q:domains cached: {}",
        "·".bright_black(),
        repo.cache().contains("q:domains")
    );

    let removed = repo.notify(InvalidationEvent::resource(LINKS));
    println!(
        "{} invalidate({}) removed {} entries",
        "✓".bright_green(),
        LINKS.bright_cyan(),
        removed
    );

    let removed = repo.notify(InvalidationEvent::resource(DOMAINS));
    println!(
        "{} invalidate({}) removed {} entries",
        "✓".bright_green(),
        DOMAINS.bright_cyan(),
        removed
    );

    print_stats(&repo.cache_stats(), repo.cache().len());
    Ok(())
}

/// List a domain's links around a write to show read-through and invalidation
pub async fn list_links(config: CacheConfig, domain: &str) -> Result<()> {
    let repo = CachedRepository::new(config)?;
    let sweeper = repo.cache().start_sweeper();

    let row = repo.create_domain(domain);
    repo.create_link(row.id, "home", "https://example.com")?;

    for round in 1..=2 {
        let start = Instant::now();
        let links = repo.links_by_domain(domain).await?;
        println!(
            "{} Round {}: {} links in {:.3}ms",
            "→".bright_blue(),
            round,
            links.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    let link = repo.create_link(row.id, "blog", "https://example.com/blog")?;
    println!(
        "{} Created {} -> {}",
        "✓".bright_green(),
        link.slug.bright_cyan(),
        link.url
    );

    let links = repo.links_by_domain(domain).await?;
    println!("{}", serde_json::to_string_pretty(&links)?);

    if let Some(url) = repo.redirect(row.id, "blog").await? {
        println!("{} /blog redirects to {}", "✓".bright_green(), url);
    }

    print_stats(&repo.cache_stats(), repo.cache().len());
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(())
}

/// Print the effective cache configuration as JSON
pub fn show_config(config: &CacheConfig) -> Result<()> {
    let settings = CacheSettings::from(config);
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn step<V: Clone>(key: &str, result: &str, cache: &Arc<QueryCache<V>>) {
    println!(
        "{} read({}) -> {} [entries: {}]",
        "→".bright_blue(),
        key.bright_cyan(),
        result,
        cache.len()
    );
}

fn print_stats(stats: &CacheStats, entries: usize) {
    println!();
    println!("{}", "Cache Statistics:".bright_yellow());
    println!("  Hits:          {}", stats.hits());
    println!("  Misses:        {}", stats.misses());
    println!("  Hit Rate:      {:.1}%", stats.hit_rate() * 100.0);
    println!("  Computations:  {}", stats.computations());
    println!("  Evictions:     {}", stats.evictions());
    println!("  Expirations:   {}", stats.expirations());
    println!("  Invalidations: {}", stats.invalidations());
    println!("  Entries:       {}", entries);
}
