//! Persistent store adapter.
//!
//! Wraps a [`DocumentBackend`] with the two operations the resolver needs.
//! Both are best-effort: a failing backend degrades to "nothing found" on
//! reads and to a logged no-op on writes.

use std::sync::Arc;

use alma_core::constants::{
    MAX_BATCH_WRITES, MAX_DOCUMENT_KEY_BYTES, PREFIX_QUERY_LIMIT, PREFIX_RANGE_SUFFIX,
};
use alma_core::{derive_document_key, AlmaResult, Institution};

use super::traits::DocumentBackend;

/// Outcome of one [`PersistentStore::upsert_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Records handed to the call.
    pub received: usize,
    /// Documents the backend reported as written.
    pub committed: usize,
    /// Records dropped by the per-call write ceiling.
    pub truncated: usize,
    /// Records dropped because their document key is too long to store.
    pub skipped: usize,
    /// Whether the commit failed.
    pub failed: bool,
}

/// `[lower, upper)` bounds simulating a "starts with" match on `name`.
pub fn prefix_bounds(query: &str) -> (String, String) {
    let mut upper = String::with_capacity(query.len() + PREFIX_RANGE_SUFFIX.len_utf8());
    upper.push_str(query);
    upper.push(PREFIX_RANGE_SUFFIX);
    (query.to_string(), upper)
}

/// Adapter isolating all interaction with the durable institution collection.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn DocumentBackend>,
    query_limit: usize,
    batch_limit: usize,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            query_limit: PREFIX_QUERY_LIMIT,
            batch_limit: MAX_BATCH_WRITES,
        }
    }

    /// Override the per-call write ceiling.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn with_query_limit(mut self, limit: usize) -> Self {
        self.query_limit = limit.max(1);
        self
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    /// Prefix query with backend errors surfaced.
    pub async fn try_search_prefix(&self, query: &str) -> AlmaResult<Vec<Institution>> {
        let (lower, upper) = prefix_bounds(query);
        self.backend
            .range_by_name(&lower, &upper, self.query_limit)
            .await
    }

    /// Prefix query on `name`, limited to 20 results.
    ///
    /// Never fails: an empty result means "not found", which may also mean
    /// the backend was unreachable.
    pub async fn search_prefix(&self, query: &str) -> Vec<Institution> {
        match self.try_search_prefix(query).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    stage = "store",
                    query,
                    error = %e,
                    "Prefix query failed, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Merge institutions into the store under their document keys.
    ///
    /// Only the first `batch_limit` records are written; the rest are dropped
    /// and the drop is logged. Failures are logged, never returned.
    pub async fn upsert_batch(&self, institutions: &[Institution]) -> UpsertReport {
        let mut report = UpsertReport {
            received: institutions.len(),
            ..Default::default()
        };
        if institutions.is_empty() {
            return report;
        }

        let accepted = institutions.len().min(self.batch_limit);
        report.truncated = institutions.len() - accepted;
        if report.truncated > 0 {
            tracing::warn!(
                stage = "backfill",
                received = report.received,
                accepted,
                dropped = report.truncated,
                batch_limit = self.batch_limit,
                "Upsert exceeds per-call write ceiling, dropping excess records"
            );
        }

        let mut batch: Vec<(String, Institution)> = Vec::with_capacity(accepted);
        for institution in &institutions[..accepted] {
            let key = derive_document_key(institution);
            if key.len() > MAX_DOCUMENT_KEY_BYTES {
                report.skipped += 1;
                tracing::warn!(
                    stage = "backfill",
                    key_bytes = key.len(),
                    max_key_bytes = MAX_DOCUMENT_KEY_BYTES,
                    "Document key too long, skipping record"
                );
                continue;
            }
            batch.push((key, institution.clone()));
        }
        if batch.is_empty() {
            return report;
        }

        match self.backend.commit_merge_batch(&batch).await {
            Ok(written) => {
                report.committed = written;
                tracing::debug!(stage = "backfill", committed = written, "Upsert committed");
            }
            Err(e) => {
                report.failed = true;
                tracing::warn!(
                    stage = "backfill",
                    records = batch.len(),
                    error = %e,
                    "Upsert failed, dropping batch"
                );
            }
        }

        report
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("query_limit", &self.query_limit)
            .field("batch_limit", &self.batch_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::in_memory::InMemoryDocumentBackend;
    use alma_core::{AlmaError, StorageError};
    use async_trait::async_trait;

    struct BrokenBackend;

    #[async_trait]
    impl DocumentBackend for BrokenBackend {
        async fn range_by_name(
            &self,
            _lower: &str,
            _upper: &str,
            _limit: usize,
        ) -> AlmaResult<Vec<Institution>> {
            Err(AlmaError::Storage(StorageError::Unavailable {
                reason: "connection refused".to_string(),
            }))
        }

        async fn commit_merge_batch(
            &self,
            _batch: &[(String, Institution)],
        ) -> AlmaResult<usize> {
            Err(AlmaError::Storage(StorageError::CommitFailed {
                count: 0,
                reason: "connection refused".to_string(),
            }))
        }
    }

    fn numbered(n: usize) -> Vec<Institution> {
        (0..n)
            .map(|i| Institution::new(format!("College {:04}", i), "Kerala"))
            .collect()
    }

    #[test]
    fn test_prefix_bounds() {
        let (lower, upper) = prefix_bounds("Techno");
        assert_eq!(lower, "Techno");
        assert_eq!(upper, "Techno\u{f8ff}");
        assert!("Techno India University" >= lower.as_str());
        assert!("Techno India University" < upper.as_str());
        assert!("Technology Park" < upper.as_str());
        assert!("Techno" >= lower.as_str());
        assert!("Tech" < lower.as_str());
    }

    #[tokio::test]
    async fn test_search_prefix_masks_errors() {
        let store = PersistentStore::new(Arc::new(BrokenBackend));
        assert!(store.try_search_prefix("Techno").await.is_err());
        assert!(store.search_prefix("Techno").await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_failure_is_reported_not_raised() {
        let store = PersistentStore::new(Arc::new(BrokenBackend));
        let report = store.upsert_batch(&numbered(3)).await;
        assert!(report.failed);
        assert_eq!(report.committed, 0);
    }

    #[tokio::test]
    async fn test_upsert_then_search() {
        let store = PersistentStore::new(Arc::new(InMemoryDocumentBackend::new()));
        let report = store
            .upsert_batch(&[
                Institution::new("Techno India University", "West Bengal"),
                Institution::new("Techno Main Salt Lake", "West Bengal"),
                Institution::new("Heritage Institute", "West Bengal"),
            ])
            .await;
        assert_eq!(report.committed, 3);
        assert!(!report.failed);

        let found = store.search_prefix("Techno").await;
        let names: Vec<_> = found.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Techno India University", "Techno Main Salt Lake"]);
    }

    #[tokio::test]
    async fn test_search_prefix_is_case_sensitive() {
        let store = PersistentStore::new(Arc::new(InMemoryDocumentBackend::new()));
        store
            .upsert_batch(&[Institution::new("Techno India University", "West Bengal")])
            .await;
        assert!(store.search_prefix("techno").await.is_empty());
    }

    #[tokio::test]
    async fn test_search_prefix_limit() {
        let store = PersistentStore::new(Arc::new(InMemoryDocumentBackend::new()));
        store.upsert_batch(&numbered(30)).await;
        assert_eq!(store.search_prefix("College").await.len(), PREFIX_QUERY_LIMIT);
    }

    #[tokio::test]
    async fn test_upsert_truncates_at_ceiling() {
        let backend = Arc::new(InMemoryDocumentBackend::new());
        let store = PersistentStore::new(backend.clone());

        let report = store.upsert_batch(&numbered(MAX_BATCH_WRITES + 25)).await;
        assert_eq!(report.received, MAX_BATCH_WRITES + 25);
        assert_eq!(report.committed, MAX_BATCH_WRITES);
        assert_eq!(report.truncated, 25);
        assert!(!report.failed);
        assert_eq!(backend.len(), MAX_BATCH_WRITES);

        // The first N are the ones kept.
        assert!(backend.get("college-0000-kerala").is_some());
        assert!(backend.get("college-0399-kerala").is_some());
        assert!(backend.get("college-0400-kerala").is_none());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let backend = Arc::new(InMemoryDocumentBackend::new());
        let store = PersistentStore::new(backend.clone());
        let batch = vec![Institution::new("Loreto College", "West Bengal").with_city("Kolkata")];

        store.upsert_batch(&batch).await;
        store.upsert_batch(&batch).await;
        assert_eq!(backend.len(), 1);
        assert_eq!(store.search_prefix("Loreto").await, batch);
    }

    #[tokio::test]
    async fn test_upsert_empty_is_noop() {
        let store = PersistentStore::new(Arc::new(BrokenBackend));
        let report = store.upsert_batch(&[]).await;
        assert_eq!(report, UpsertReport::default());
    }
}
