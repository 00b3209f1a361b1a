//! Constants for ALMA
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// RECORD MODEL
// ============================================================================

/// State recorded when the source omits one.
pub const UNKNOWN_STATE: &str = "Unknown";

/// Name the external source uses for entries it could not parse.
/// Records carrying it are dropped during normalization.
pub const PLACEHOLDER_NAME: &str = "Unknown";

/// Separator used when collapsing document keys.
pub const DOCUMENT_KEY_SEPARATOR: char = '-';

// ============================================================================
// RESOLVER
// ============================================================================

/// Queries shorter than this (in characters) never touch a tier.
pub const MIN_QUERY_LENGTH: usize = 3;

/// Default ephemeral cache TTL in milliseconds (1 hour).
pub const DEFAULT_CACHE_TTL_MS: u64 = 3_600_000;

// ============================================================================
// PERSISTENT STORE
// ============================================================================

/// Maximum number of documents returned by a prefix query.
pub const PREFIX_QUERY_LIMIT: usize = 20;

/// Upper-bound suffix appended to a prefix to form the exclusive range end.
pub const PREFIX_RANGE_SUFFIX: char = '\u{f8ff}';

/// Per-call write ceiling for batched upserts.
pub const MAX_BATCH_WRITES: usize = 400;

/// Bytes of a name kept in the name index. LMDB keys are capped at 511
/// bytes, and an index key also carries the document key.
pub const MAX_INDEXED_NAME_BYTES: usize = 200;

/// Documents whose key is longer than this are not stored.
pub const MAX_DOCUMENT_KEY_BYTES: usize = 300;

/// Default on-disk location of the LMDB store.
pub const DEFAULT_STORE_PATH: &str = "./data/institutions";

/// Default LMDB map size in megabytes.
pub const DEFAULT_STORE_MAX_SIZE_MB: usize = 64;

// ============================================================================
// EXTERNAL SOURCE
// ============================================================================

/// Name used for the external source in logs and errors.
pub const SOURCE_NAME: &str = "colleges-api";

/// Default external lookup endpoint.
pub const DEFAULT_SOURCE_BASE_URL: &str = "https://colleges-api.onrender.com/colleges/search";

/// Query parameter carrying the free-text name.
pub const SOURCE_QUERY_PARAM: &str = "name";

/// Hard client-side timeout for the external call in milliseconds.
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 5_000;

/// Default client-side rate limit for the external source.
pub const DEFAULT_SOURCE_REQUESTS_PER_MINUTE: u32 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ceiling_exceeds_query_limit() {
        assert!(MAX_BATCH_WRITES > PREFIX_QUERY_LIMIT);
    }

    #[test]
    fn test_index_key_fits_lmdb_limit() {
        assert!(MAX_INDEXED_NAME_BYTES + 1 + MAX_DOCUMENT_KEY_BYTES < 511);
    }

    #[test]
    fn test_default_ttl_is_one_hour() {
        assert_eq!(DEFAULT_CACHE_TTL_MS, 60 * 60 * 1000);
    }
}
