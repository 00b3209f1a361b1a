//! ALMA Resolver - Tiered Institution Lookup
//!
//! Resolves a free-text college name through three tiers, each consulted
//! only when the previous one misses:
//!
//! 1. the process-local [`EphemeralCache`]
//! 2. the durable [`PersistentStore`]
//! 3. the rate-limited [`ExternalSourceClient`]
//!
//! A non-empty external answer is cached synchronously and backfilled into
//! the persistent store by a detached task, so the next identical query
//! never leaves the process. No error crosses [`Resolver::lookup`].

use std::sync::Arc;

use alma_core::constants::MIN_QUERY_LENGTH;
use alma_core::{Institution, ResolverConfig};
use alma_source::ExternalSourceClient;
use alma_storage::{EphemeralCache, PersistentStore};
use serde::Serialize;
use tokio::runtime::Handle;

// ============================================================================
// RESOLUTION
// ============================================================================

/// The tier that produced a lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cache,
    Store,
    Api,
    /// Nothing matched, or the lookup was rejected up front.
    None,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Cache => "cache",
            Tier::Store => "store",
            Tier::Api => "api",
            Tier::None => "none",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup result tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub source: Tier,
    pub institutions: Vec<Institution>,
    /// True when a consulted tier failed and was treated as empty.
    pub degraded: bool,
}

impl Resolution {
    fn empty(degraded: bool) -> Self {
        Self {
            source: Tier::None,
            institutions: Vec::new(),
            degraded,
        }
    }

    fn found(source: Tier, institutions: Vec<Institution>, degraded: bool) -> Self {
        Self {
            source,
            institutions,
            degraded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Orchestrates the cache, store and external tiers.
#[derive(Clone)]
pub struct Resolver {
    config: ResolverConfig,
    cache: Arc<EphemeralCache>,
    store: Arc<PersistentStore>,
    source: Arc<ExternalSourceClient>,
}

impl Resolver {
    /// Wire a resolver over existing tiers.
    ///
    /// The cache keeps its own TTL, which must equal `config.cache_ttl`.
    pub fn new(
        config: ResolverConfig,
        cache: Arc<EphemeralCache>,
        store: Arc<PersistentStore>,
        source: Arc<ExternalSourceClient>,
    ) -> Self {
        debug_assert_eq!(
            cache.ttl(),
            config.cache_ttl,
            "cache TTL disagrees with the resolver configuration"
        );
        Self {
            config,
            cache,
            store,
            source,
        }
    }

    /// Resolver with a fresh cache sized by `config.cache_ttl`.
    pub fn with_defaults(
        config: ResolverConfig,
        store: PersistentStore,
        source: ExternalSourceClient,
    ) -> Self {
        let cache = Arc::new(EphemeralCache::new(config.cache_ttl));
        Self::new(config, cache, Arc::new(store), Arc::new(source))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EphemeralCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<PersistentStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<ExternalSourceClient> {
        &self.source
    }

    /// Resolve `query` to an ordered list of institutions.
    ///
    /// Returns an empty list when the resolver is disabled, the query is too
    /// short, or no tier has a match. Never fails.
    pub async fn lookup(&self, query: &str) -> Vec<Institution> {
        self.lookup_detailed(query).await.institutions
    }

    /// Like [`Resolver::lookup`], but reports the serving tier and whether
    /// any tier failed along the way.
    pub async fn lookup_detailed(&self, query: &str) -> Resolution {
        if !self.config.enabled {
            tracing::trace!(query, "Resolver disabled");
            return Resolution::empty(false);
        }
        if query.chars().count() < MIN_QUERY_LENGTH {
            tracing::trace!(query, "Query below minimum length");
            return Resolution::empty(false);
        }

        if let Some(cached) = self.cache.get(query) {
            tracing::debug!(stage = "cache", query, results = cached.len(), "Cache hit");
            return Resolution::found(Tier::Cache, cached, false);
        }

        let mut degraded = false;

        match self.store.try_search_prefix(query).await {
            Ok(found) if !found.is_empty() => {
                tracing::debug!(stage = "store", query, results = found.len(), "Store hit");
                self.cache.set(query, found.clone());
                return Resolution::found(Tier::Store, found, false);
            }
            Ok(_) => {}
            Err(e) => {
                degraded = true;
                tracing::warn!(
                    stage = "store",
                    query,
                    error = %e,
                    "Store lookup failed, falling through to external source"
                );
            }
        }

        match self.source.try_fetch_institutions(query).await {
            Ok(found) if !found.is_empty() => {
                tracing::debug!(stage = "api", query, results = found.len(), "External hit");
                self.spawn_backfill(query, found.clone());
                self.cache.set(query, found.clone());
                Resolution::found(Tier::Api, found, degraded)
            }
            Ok(_) => Resolution::empty(degraded),
            Err(e) => {
                tracing::warn!(
                    stage = "api",
                    query,
                    error = %e,
                    "External lookup failed, returning no results"
                );
                Resolution::empty(true)
            }
        }
    }

    /// Persist `institutions` on a detached task. The lookup never waits on it.
    fn spawn_backfill(&self, query: &str, institutions: Vec<Institution>) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(
                    stage = "backfill",
                    query,
                    records = institutions.len(),
                    "No async runtime available, skipping backfill"
                );
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let query = query.to_string();
        handle.spawn(async move {
            let report = store.upsert_batch(&institutions).await;
            tracing::debug!(
                stage = "backfill",
                query = %query,
                committed = report.committed,
                truncated = report.truncated,
                skipped = report.skipped,
                failed = report.failed,
                "Backfill finished"
            );
        });
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alma_core::SourceConfig;
    use alma_storage::InMemoryDocumentBackend;
    use alma_test_utils::RecordingDocumentBackend;
    use std::time::Duration;

    fn resolver(enabled: bool) -> Resolver {
        Resolver::with_defaults(
            ResolverConfig::new().with_enabled(enabled),
            PersistentStore::new(Arc::new(InMemoryDocumentBackend::new())),
            ExternalSourceClient::from_config(&SourceConfig::default()),
        )
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(Tier::Cache.to_string(), "cache");
        assert_eq!(Tier::None.as_str(), "none");
        assert_eq!(
            serde_json::to_value(Tier::Api).expect("serialize"),
            serde_json::json!("api")
        );
    }

    #[tokio::test]
    async fn test_disabled_resolver_returns_empty() {
        let resolver = resolver(false);
        resolver
            .cache()
            .set("loreto", vec![Institution::new("Loreto College", "West Bengal")]);

        let resolution = resolver.lookup_detailed("loreto").await;
        assert_eq!(resolution.source, Tier::None);
        assert!(resolution.is_empty());
        assert!(!resolution.degraded);
    }

    #[tokio::test]
    async fn test_length_guard_counts_raw_characters() {
        let resolver = resolver(true);
        let cached = vec![Institution::new("Abc College", "Bihar")];
        resolver.cache().set(" ab ", cached.clone());

        assert_eq!(resolver.lookup(" ab ").await, cached);
        assert!(resolver.lookup("ab").await.is_empty());
    }

    #[tokio::test]
    async fn test_uses_configured_ttl() {
        let resolver = Resolver::with_defaults(
            ResolverConfig::new()
                .with_enabled(true)
                .with_cache_ttl(Duration::from_secs(90)),
            PersistentStore::new(Arc::new(InMemoryDocumentBackend::new())),
            ExternalSourceClient::from_config(&SourceConfig::default()),
        );
        assert_eq!(resolver.cache().ttl(), Duration::from_secs(90));
    }

    #[test]
    fn test_backfill_without_runtime_is_skipped() {
        let backend = Arc::new(RecordingDocumentBackend::new());
        let resolver = Resolver::with_defaults(
            ResolverConfig::new().with_enabled(true),
            PersistentStore::new(backend.clone()),
            ExternalSourceClient::from_config(&SourceConfig::default()),
        );

        resolver.spawn_backfill(
            "Techno India",
            vec![Institution::new("Techno India University", "West Bengal")],
        );

        assert_eq!(backend.commit_calls(), 0);
        assert!(backend.is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "cache TTL disagrees")]
    fn test_mismatched_cache_ttl_is_rejected() {
        Resolver::new(
            ResolverConfig::new().with_cache_ttl(Duration::from_secs(60)),
            Arc::new(EphemeralCache::new(Duration::from_secs(30))),
            Arc::new(PersistentStore::new(Arc::new(InMemoryDocumentBackend::new()))),
            Arc::new(ExternalSourceClient::from_config(&SourceConfig::default())),
        );
    }
}
