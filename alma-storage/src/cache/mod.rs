//! Ephemeral cache tier.
//!
//! A process-local map from lowercased query to the institutions last
//! resolved for it. Freshness is bounded by a TTL checked lazily on read; the
//! time source is injected so expiry can be tested deterministically.
//!
//! # Example
//!
//! ```ignore
//! let cache = EphemeralCache::new(Duration::from_secs(3600));
//! cache.set("Techno India", institutions);
//! assert!(cache.get("techno india").is_some());
//! ```

pub mod clock;
pub mod ephemeral;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ephemeral::{cache_key, CacheEntry, EphemeralCache};
pub use traits::CacheStats;
