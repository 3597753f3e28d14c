use anyhow::Result;
use clap::{Parser, Subcommand};
use shortener_cache::{CacheConfig, CacheSettings};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod repository;

use commands::*;

#[derive(Parser)]
#[command(name = "shortener")]
#[command(author, version, about = "URL shortener query cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Cache configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the maximum number of cached results
    #[arg(long, global = true)]
    capacity: Option<usize>,

    /// Override the default TTL in milliseconds
    #[arg(long, global = true, allow_negative_numbers = true)]
    ttl_ms: Option<i64>,

    /// Run the background expiry sweep every N milliseconds
    #[arg(long, global = true)]
    sweep_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through eviction and table invalidation with a two-entry cache
    Demo,

    /// Seed a domain, list its links around a write
    Links {
        /// Domain name
        #[arg(short, long, default_value = "sho.rt")]
        domain: String,
    },

    /// Print the effective cache configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose)?;

    let config = load_config(&cli)?;

    match cli.command {
        Some(Commands::Demo) | None => {
            run_demo(config).await?;
        }
        Some(Commands::Links { domain }) => {
            list_links(config, &domain).await?;
        }
        Some(Commands::Config) => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// Settings file first, command-line overrides on top; validated once
fn load_config(cli: &Cli) -> Result<CacheConfig> {
    let mut settings = match &cli.config {
        Some(path) => CacheSettings::from_file(path)?,
        None => CacheSettings::default(),
    };

    if let Some(capacity) = cli.capacity {
        settings.max_entries = capacity;
    }
    if let Some(ttl_ms) = cli.ttl_ms {
        settings.default_ttl_ms = ttl_ms;
    }
    if let Some(sweep_ms) = cli.sweep_ms {
        settings.sweep_interval_ms = Some(sweep_ms);
    }

    let config = CacheConfig::try_from(settings)?;
    tracing::debug!(
        "Cache config: max_entries={}, ttl={:?}, sweep={:?}",
        config.max_entries,
        config.default_ttl,
        config.sweep_interval.unwrap_or(Duration::ZERO)
    );
    Ok(config)
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        "shortener=debug,shortener_cache=debug"
    } else {
        "shortener=info,shortener_cache=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
