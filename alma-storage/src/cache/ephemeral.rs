//! Process-local, time-bounded query cache.
//!
//! Keys are the raw query lowercased verbatim. Entries are never swept; an
//! entry older than the TTL is evicted by the read that finds it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alma_core::constants::DEFAULT_CACHE_TTL_MS;
use alma_core::Institution;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::clock::{Clock, SystemClock};
use super::traits::CacheStats;

/// One cached lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: Vec<Institution>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// True when `now - cached_at` is strictly greater than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .map(|age| age > ttl)
            .unwrap_or(false)
    }
}

/// Cache key for a query.
pub fn cache_key(query: &str) -> String {
    query.to_lowercase()
}

/// Ephemeral key/value cache with lazy TTL eviction.
///
/// Owned by one process and handed to the resolver at construction time. It
/// holds no policy about what is worth caching.
pub struct EphemeralCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl EphemeralCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a query. Expired entries are removed and reported as a miss.
    pub fn get(&self, query: &str) -> Option<Vec<Institution>> {
        let key = cache_key(query);
        let now = self.clock.now();

        // The shard guard must be released before removal.
        let expired = match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.data.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let ttl = self.ttl;
            if self
                .entries
                .remove_if(&key, |_, entry| entry.is_expired(now, ttl))
                .is_some()
            {
                self.expirations.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(query, "Evicted expired cache entry");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Create or overwrite the entry for a query, stamped with the current time.
    pub fn set(&self, query: &str, data: Vec<Institution>) {
        let entry = CacheEntry {
            data,
            cached_at: self.clock.now(),
        };
        self.entries.insert(cache_key(query), entry);
    }

    /// Inspect an entry without touching statistics or evicting it.
    pub fn peek(&self, query: &str) -> Option<CacheEntry> {
        self.entries.get(&cache_key(query)).map(|e| e.clone())
    }

    /// Drop every entry. Intended for test harnesses.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count: self.entries.len() as u64,
        }
    }
}

impl Default for EphemeralCache {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_CACHE_TTL_MS))
    }
}

impl std::fmt::Debug for EphemeralCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;

    const TTL: Duration = Duration::from_millis(3_600_000);

    fn cache_with_clock() -> (EphemeralCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = EphemeralCache::with_clock(TTL, clock.clone());
        (cache, clock)
    }

    fn sample() -> Vec<Institution> {
        vec![Institution::new("Techno India University", "West Bengal")]
    }

    #[test]
    fn test_get_missing_is_miss() {
        let (cache, _clock) = cache_with_clock();
        assert!(cache.get("techno india").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_set_then_get_case_insensitive() {
        let (cache, _clock) = cache_with_clock();
        cache.set("Techno India", sample());

        assert!(cache.peek("techno india").is_some());
        assert_eq!(cache.get("TECHNO INDIA"), Some(sample()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_key_is_not_trimmed() {
        let (cache, _clock) = cache_with_clock();
        cache.set("techno india ", sample());
        assert!(cache.get("techno india").is_none());
    }

    #[test]
    fn test_entry_fresh_at_exact_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("techno india", sample());

        clock.advance(TTL);
        assert_eq!(cache.get("techno india"), Some(sample()));
    }

    #[test]
    fn test_entry_expires_one_ms_after_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("techno india", sample());

        clock.advance(TTL + Duration::from_millis(1));
        assert!(cache.get("techno india").is_none());
        assert!(cache.peek("techno india").is_none(), "expired entry must be evicted");
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_set_overwrites_and_restamps() {
        let (cache, clock) = cache_with_clock();
        cache.set("techno india", sample());
        clock.advance(TTL);

        let replacement = vec![Institution::new("Techno India College", "West Bengal")];
        cache.set("Techno India", replacement.clone());
        clock.advance(Duration::from_millis(10));

        assert_eq!(cache.get("techno india"), Some(replacement));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_accepts_empty_data() {
        let (cache, _clock) = cache_with_clock();
        cache.set("nothing here", Vec::new());
        assert_eq!(cache.get("nothing here"), Some(Vec::new()));
    }

    #[test]
    fn test_clear() {
        let (cache, _clock) = cache_with_clock();
        cache.set("one", sample());
        cache.set("two", sample());
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_default_ttl() {
        assert_eq!(EphemeralCache::default().ttl(), Duration::from_secs(3600));
    }
}
