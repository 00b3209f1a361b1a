//! Document backend trait.

use alma_core::constants::MAX_INDEXED_NAME_BYTES;
use alma_core::{AlmaResult, Institution};
use async_trait::async_trait;

/// Durable document collection holding ingested institutions.
///
/// Implementations must be thread-safe; the persistent store shares one
/// backend between request handlers and detached backfill tasks.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Documents whose `name` lies in `[lower, upper)`, in name order, at most
    /// `limit` of them.
    async fn range_by_name(
        &self,
        lower: &str,
        upper: &str,
        limit: usize,
    ) -> AlmaResult<Vec<Institution>>;

    /// Merge each `(document_key, institution)` into the stored document at
    /// that key, creating it when absent.
    ///
    /// The whole call commits atomically. Returns the number of documents
    /// written.
    async fn commit_merge_batch(&self, batch: &[(String, Institution)]) -> AlmaResult<usize>;
}

/// The part of `name` stored in the name index, cut at a char boundary.
///
/// Names longer than the cap still match any prefix query up to the cap.
pub(crate) fn indexed_name(name: &str) -> &str {
    if name.len() <= MAX_INDEXED_NAME_BYTES {
        return name;
    }
    let mut end = MAX_INDEXED_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_name_cuts_at_char_boundary() {
        assert_eq!(indexed_name("Techno India"), "Techno India");

        let long = "é".repeat(150);
        let cut = indexed_name(&long);
        assert!(cut.len() <= MAX_INDEXED_NAME_BYTES);
        assert_eq!(cut.chars().count(), MAX_INDEXED_NAME_BYTES / 2);
    }
}
