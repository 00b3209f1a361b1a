//! In-memory document backend for tests and local development.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use alma_core::{AlmaResult, Institution, StorageError};
use async_trait::async_trait;

use super::traits::{indexed_name, DocumentBackend};

#[derive(Debug, Default)]
struct Collection {
    /// document key -> document
    documents: BTreeMap<String, Institution>,
    /// "name \0 document key" -> document key
    by_name: BTreeMap<String, String>,
}

fn index_key(name: &str, document_key: &str) -> String {
    format!("{}\0{}", indexed_name(name), document_key)
}

/// `BTreeMap`-backed backend with the same ordering as the LMDB one.
#[derive(Debug, Default)]
pub struct InMemoryDocumentBackend {
    inner: RwLock<Collection>,
}

impl InMemoryDocumentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a document by key.
    pub fn get(&self, document_key: &str) -> Option<Institution> {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.documents.get(document_key).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.documents.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentBackend for InMemoryDocumentBackend {
    async fn range_by_name(
        &self,
        lower: &str,
        upper: &str,
        limit: usize,
    ) -> AlmaResult<Vec<Institution>> {
        if lower >= upper {
            return Ok(Vec::new());
        }
        let collection = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        let found = collection
            .by_name
            .range::<str, _>((Bound::Included(lower), Bound::Excluded(upper)))
            .filter_map(|(_, key)| collection.documents.get(key).cloned())
            .take(limit)
            .collect();
        Ok(found)
    }

    async fn commit_merge_batch(&self, batch: &[(String, Institution)]) -> AlmaResult<usize> {
        let mut collection = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;

        for (key, incoming) in batch {
            let merged = match collection.documents.remove(key) {
                Some(existing) => {
                    collection.by_name.remove(&index_key(&existing.name, key));
                    existing.merged_with(incoming.clone())
                }
                None => incoming.clone(),
            };
            collection
                .by_name
                .insert(index_key(&merged.name, key), key.clone());
            collection.documents.insert(key.clone(), merged);
        }

        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_preserves_fields_and_reindexes() {
        let backend = InMemoryDocumentBackend::new();
        let key = "loreto-college-west-bengal".to_string();

        backend
            .commit_merge_batch(&[(
                key.clone(),
                Institution::new("Loreto College", "West Bengal").with_city("Kolkata"),
            )])
            .await
            .expect("commit should succeed");
        backend
            .commit_merge_batch(&[(
                key.clone(),
                Institution::new("LORETO College", "West Bengal").with_kind("Private"),
            )])
            .await
            .expect("commit should succeed");

        let stored = backend.get(&key).expect("document should exist");
        assert_eq!(stored.name, "LORETO College");
        assert_eq!(stored.city.as_deref(), Some("Kolkata"));
        assert_eq!(stored.kind.as_deref(), Some("Private"));

        assert!(backend
            .range_by_name("Loreto", "Loreto\u{f8ff}", 20)
            .await
            .expect("range should succeed")
            .is_empty());
        assert_eq!(
            backend
                .range_by_name("LORETO", "LORETO\u{f8ff}", 20)
                .await
                .expect("range should succeed")
                .len(),
            1
        );
    }
}
