//! Cache configuration options

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of cached query results
pub const DEFAULT_MAX_ENTRIES: usize = 5000;

/// Default time-to-live in milliseconds
pub const DEFAULT_TTL_MS: u64 = 1000;

/// Configuration for the query cache
///
/// Fixed at construction; [`QueryCache::new`](crate::QueryCache::new) rejects
/// invalid values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub max_entries: usize,
    /// Time-to-live applied when a read does not specify one
    pub default_ttl: Duration,
    /// Whether caching is enabled
    pub enabled: bool,
    /// Period of the optional background expiry sweep
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: Duration::from_millis(DEFAULT_TTL_MS),
            enabled: true,
            sweep_interval: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with custom settings
    pub fn new(max_entries: usize, default_ttl_ms: u64) -> Self {
        Self {
            max_entries,
            default_ttl: Duration::from_millis(default_ttl_ms),
            ..Default::default()
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the maximum number of entries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the default TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Run a background sweep every `interval`
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Check the configuration for values the cache cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidCapacity);
        }
        if self.sweep_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(CacheError::InvalidSweepInterval);
        }
        Ok(())
    }
}

/// On-disk (JSON) form of [`CacheConfig`]
///
/// Numbers are kept raw so that out-of-range values surface as
/// [`CacheError`]s instead of being silently clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub default_ttl_ms: i64,
    pub enabled: bool,
    pub sweep_interval_ms: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl_ms: DEFAULT_TTL_MS as i64,
            enabled: true,
            sweep_interval_ms: None,
        }
    }
}

impl CacheSettings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings: CacheSettings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl TryFrom<CacheSettings> for CacheConfig {
    type Error = CacheError;

    fn try_from(settings: CacheSettings) -> Result<Self> {
        let ttl_ms = u64::try_from(settings.default_ttl_ms)
            .map_err(|_| CacheError::NegativeTtl(settings.default_ttl_ms))?;

        let config = CacheConfig {
            max_entries: settings.max_entries,
            default_ttl: Duration::from_millis(ttl_ms),
            enabled: settings.enabled,
            sweep_interval: settings.sweep_interval_ms.map(Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            default_ttl_ms: i64::try_from(config.default_ttl.as_millis()).unwrap_or(i64::MAX),
            enabled: config.enabled,
            sweep_interval_ms: config
                .sweep_interval
                .map(|interval| u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 5000);
        assert_eq!(config.default_ttl, Duration::from_millis(1000));
        assert!(config.enabled);
        assert!(config.sweep_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_config() {
        let config = CacheConfig::disabled();
        assert!(!config.enabled);
    }

    #[test]
    fn test_builder_pattern() {
        let config = CacheConfig::default()
            .with_max_entries(500)
            .with_ttl(Duration::from_secs(60))
            .with_sweep_interval(Duration::from_secs(5))
            .with_enabled(true);

        assert_eq!(config.max_entries, 500);
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = CacheConfig::default().with_max_entries(0);
        assert!(matches!(config.validate(), Err(CacheError::InvalidCapacity)));
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let config = CacheConfig::default().with_sweep_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidSweepInterval)
        ));
    }

    #[test]
    fn test_settings_negative_ttl_rejected() {
        let settings = CacheSettings {
            default_ttl_ms: -5,
            ..Default::default()
        };
        let result = CacheConfig::try_from(settings);
        assert!(matches!(result, Err(CacheError::NegativeTtl(-5))));
    }

    #[test]
    fn test_settings_zero_ttl_accepted() {
        let settings = CacheSettings {
            default_ttl_ms: 0,
            ..Default::default()
        };
        let config = CacheConfig::try_from(settings).unwrap();
        assert_eq!(config.default_ttl, Duration::ZERO);
    }

    #[test]
    fn test_settings_partial_json() {
        let settings: CacheSettings = serde_json::from_str(r#"{"max_entries": 2}"#).unwrap();
        let config = CacheConfig::try_from(settings).unwrap();
        assert_eq!(config.max_entries, 2);
        assert_eq!(config.default_ttl, Duration::from_millis(DEFAULT_TTL_MS));
    }

    #[test]
    fn test_settings_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let config = CacheConfig::new(16, 250).with_sweep_interval(Duration::from_millis(100));
        CacheSettings::from(&config).save(&path).unwrap();

        let loaded = CacheConfig::try_from(CacheSettings::from_file(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_settings_missing_file() {
        let result = CacheSettings::from_file(Path::new("/nonexistent/cache.json"));
        assert!(matches!(result, Err(CacheError::IoError(_))));
    }
}
