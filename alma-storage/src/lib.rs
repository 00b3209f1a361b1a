//! ALMA Storage - Cache and Persistent Store Tiers
//!
//! The two local tiers of the institution resolver: a process-local
//! [`EphemeralCache`] and the [`PersistentStore`] adapter over a durable
//! [`DocumentBackend`].

pub mod cache;
pub mod store;

pub use cache::{
    cache_key, CacheEntry, CacheStats, Clock, EphemeralCache, ManualClock, SystemClock,
};
pub use store::{
    prefix_bounds, DocumentBackend, InMemoryDocumentBackend, LmdbDocumentBackend,
    LmdbStoreError, PersistentStore, UpsertReport,
};
