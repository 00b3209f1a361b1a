//! Persistent store tier.
//!
//! The durable, shared record of previously seen external results. All
//! writes are idempotent field merges keyed by the derived document key, so
//! concurrent duplicate backfills from several processes converge.

pub mod adapter;
pub mod in_memory;
pub mod lmdb_backend;
pub mod traits;

pub use adapter::{prefix_bounds, PersistentStore, UpsertReport};
pub use in_memory::InMemoryDocumentBackend;
pub use lmdb_backend::{LmdbDocumentBackend, LmdbStoreError};
pub use traits::DocumentBackend;
