//! Configuration types
//!
//! Every setting has a default and can be overridden from the environment:
//!
//! - `ALMA_FALLBACK_ENABLED`: enable the whole fallback subsystem (default: false)
//! - `ALMA_SOURCE_BASE_URL`: external lookup endpoint
//! - `ALMA_CACHE_TTL_MS`: ephemeral cache TTL (default: 3600000)
//! - `ALMA_SOURCE_TIMEOUT_MS`: external call timeout (default: 5000)
//! - `ALMA_SOURCE_REQUESTS_PER_MINUTE`: client-side rate limit (default: 60)
//! - `ALMA_STORE_PATH`: LMDB directory (default: ./data/institutions)
//! - `ALMA_STORE_MAX_SIZE_MB`: LMDB map size (default: 64)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CACHE_TTL_MS, DEFAULT_SOURCE_BASE_URL, DEFAULT_SOURCE_REQUESTS_PER_MINUTE,
    DEFAULT_SOURCE_TIMEOUT_MS, DEFAULT_STORE_MAX_SIZE_MB, DEFAULT_STORE_PATH,
};
use crate::error::ConfigError;

pub const ENV_FALLBACK_ENABLED: &str = "ALMA_FALLBACK_ENABLED";
pub const ENV_SOURCE_BASE_URL: &str = "ALMA_SOURCE_BASE_URL";
pub const ENV_CACHE_TTL_MS: &str = "ALMA_CACHE_TTL_MS";
pub const ENV_SOURCE_TIMEOUT_MS: &str = "ALMA_SOURCE_TIMEOUT_MS";
pub const ENV_SOURCE_REQUESTS_PER_MINUTE: &str = "ALMA_SOURCE_REQUESTS_PER_MINUTE";
pub const ENV_STORE_PATH: &str = "ALMA_STORE_PATH";
pub const ENV_STORE_MAX_SIZE_MB: &str = "ALMA_STORE_MAX_SIZE_MB";

/// Parse a numeric setting, falling back to `default` on absence or garbage.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Settings consumed by the resolver itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Master switch for the whole fallback subsystem.
    pub enabled: bool,
    /// How long a cached result stays fresh.
    pub cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

// ============================================================================
// EXTERNAL SOURCE
// ============================================================================

/// Settings for the external lookup API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Hard timeout for one call, enforced by cancellation.
    pub timeout: Duration,
    pub requests_per_minute: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: DEFAULT_SOURCE_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_SOURCE_TIMEOUT_MS),
            requests_per_minute: DEFAULT_SOURCE_REQUESTS_PER_MINUTE,
        }
    }
}

impl SourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm;
        self
    }
}

// ============================================================================
// PERSISTENT STORE
// ============================================================================

/// Settings for the LMDB-backed persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub max_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            max_size_mb: DEFAULT_STORE_MAX_SIZE_MB,
        }
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

/// All settings for one process instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlmaConfig {
    pub resolver: ResolverConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
}

impl AlmaConfig {
    /// Build the configuration from process environment variables.
    ///
    /// Unparseable values fall back to their defaults with a warning; call
    /// [`AlmaConfig::validate`] for strict checking.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = parse_flag(&lookup, ENV_FALLBACK_ENABLED, false);

        let resolver = ResolverConfig {
            enabled,
            cache_ttl: Duration::from_millis(parse_or(
                &lookup,
                ENV_CACHE_TTL_MS,
                DEFAULT_CACHE_TTL_MS,
            )),
        };

        let source = SourceConfig {
            enabled,
            base_url: lookup(ENV_SOURCE_BASE_URL)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_BASE_URL.to_string()),
            timeout: Duration::from_millis(parse_or(
                &lookup,
                ENV_SOURCE_TIMEOUT_MS,
                DEFAULT_SOURCE_TIMEOUT_MS,
            )),
            requests_per_minute: parse_or(
                &lookup,
                ENV_SOURCE_REQUESTS_PER_MINUTE,
                DEFAULT_SOURCE_REQUESTS_PER_MINUTE,
            ),
        };

        let store = StoreConfig {
            path: lookup(ENV_STORE_PATH)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            max_size_mb: parse_or(&lookup, ENV_STORE_MAX_SIZE_MB, DEFAULT_STORE_MAX_SIZE_MB),
        };

        Self {
            resolver,
            source,
            store,
        }
    }

    /// Strict validation of values that would make the subsystem unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: ENV_CACHE_TTL_MS.to_string(),
                value: "0".to_string(),
                reason: "TTL must be positive".to_string(),
            });
        }
        if self.source.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: ENV_SOURCE_TIMEOUT_MS.to_string(),
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        if self.source.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_SOURCE_REQUESTS_PER_MINUTE.to_string(),
                value: "0".to_string(),
                reason: "rate limit must be positive".to_string(),
            });
        }
        let url = &self.source.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: ENV_SOURCE_BASE_URL.to_string(),
                value: url.clone(),
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.store.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_STORE_MAX_SIZE_MB.to_string(),
                value: "0".to_string(),
                reason: "map size must be positive".to_string(),
            });
        }
        Ok(())
    }
}
