//! LMDB-backed document backend.
//!
//! Uses the heed crate (Rust bindings for LMDB) as a durable, memory-mapped
//! document collection shared by every process that opens the same path.
//!
//! # Layout
//!
//! Two named databases live in one environment:
//! - `institutions`: document key -> JSON-encoded [`Institution`]
//! - `by_name`: `name \0 document key` -> document key, with the name cut to
//!   its first 200 bytes so index keys stay under the LMDB key limit
//!
//! Keys compare bytewise, so a range over `by_name` is a lexicographic range
//! over names with the document key as tiebreaker.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. Reads use a read transaction; each batch
//! commit is one write transaction, so a batch is applied entirely or not at
//! all.

use std::ops::Bound;
use std::path::Path;

use alma_core::{AlmaResult, Institution};
use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use super::traits::{indexed_name, DocumentBackend};

const DOCUMENTS_DB: &str = "institutions";
const BY_NAME_DB: &str = "by_name";

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error for {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStoreError to AlmaError.
impl From<LmdbStoreError> for alma_core::AlmaError {
    fn from(e: LmdbStoreError) -> Self {
        let storage = match e {
            LmdbStoreError::Deserialization { key, reason } => {
                alma_core::StorageError::CorruptDocument { key, reason }
            }
            LmdbStoreError::EnvOpen(reason) | LmdbStoreError::DbOpen(reason) => {
                alma_core::StorageError::Unavailable { reason }
            }
            other => alma_core::StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        };
        alma_core::AlmaError::Storage(storage)
    }
}

fn index_key(name: &str, document_key: &str) -> Vec<u8> {
    let name = indexed_name(name);
    let mut key = Vec::with_capacity(name.len() + 1 + document_key.len());
    key.extend_from_slice(name.as_bytes());
    key.push(0);
    key.extend_from_slice(document_key.as_bytes());
    key
}

/// LMDB document collection.
///
/// # Example
///
/// ```ignore
/// let backend = LmdbDocumentBackend::new("/var/lib/alma", 64)?;
/// let store = PersistentStore::new(Arc::new(backend));
/// ```
pub struct LmdbDocumentBackend {
    env: Env,
    documents: Database<Bytes, Bytes>,
    by_name: Database<Bytes, Bytes>,
}

impl LmdbDocumentBackend {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or its databases cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(2)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let documents: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(DOCUMENTS_DB))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        let by_name: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(BY_NAME_DB))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            documents,
            by_name,
        })
    }

    /// Fetch a document by key.
    pub fn get(&self, document_key: &str) -> Result<Option<Institution>, LmdbStoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let bytes = self
            .documents
            .get(&rtxn, document_key.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        bytes.map(|b| decode(document_key, b)).transpose()
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> Result<u64, LmdbStoreError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        self.documents
            .len(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))
    }

    /// Merge one document inside an open write transaction.
    fn merge_one(
        &self,
        wtxn: &mut RwTxn,
        key: &str,
        incoming: &Institution,
    ) -> Result<(), LmdbStoreError> {
        let existing = match self
            .documents
            .get(wtxn, key.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
        {
            Some(bytes) => Some(decode(key, bytes)?),
            None => None,
        };

        let merged = match existing {
            Some(existing) => {
                if existing.name != incoming.name {
                    self.by_name
                        .delete(wtxn, &index_key(&existing.name, key))
                        .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
                }
                existing.merged_with(incoming.clone())
            }
            None => incoming.clone(),
        };

        let value = serde_json::to_vec(&merged)
            .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;

        self.documents
            .put(wtxn, key.as_bytes(), &value)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        self.by_name
            .put(wtxn, &index_key(&merged.name, key), key.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<Institution, LmdbStoreError> {
    serde_json::from_slice(bytes).map_err(|e| LmdbStoreError::Deserialization {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl DocumentBackend for LmdbDocumentBackend {
    async fn range_by_name(
        &self,
        lower: &str,
        upper: &str,
        limit: usize,
    ) -> AlmaResult<Vec<Institution>> {
        if lower >= upper {
            return Ok(Vec::new());
        }

        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let range = (
            Bound::Included(lower.as_bytes()),
            Bound::Excluded(upper.as_bytes()),
        );
        let iter = self
            .by_name
            .range(&rtxn, &range)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut found = Vec::new();
        for entry in iter {
            if found.len() >= limit {
                break;
            }
            let (_, key_bytes) = entry.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let key = String::from_utf8_lossy(key_bytes);
            let document = self
                .documents
                .get(&rtxn, key_bytes)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            match document {
                Some(bytes) => found.push(decode(&key, bytes)?),
                // Index entries without a document are skipped.
                None => continue,
            }
        }

        Ok(found)
    }

    async fn commit_merge_batch(&self, batch: &[(String, Institution)]) -> AlmaResult<usize> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        for (key, incoming) in batch {
            // Dropping the transaction on error aborts the whole batch.
            self.merge_one(&mut wtxn, key, incoming)?;
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(batch.len())
    }
}

impl std::fmt::Debug for LmdbDocumentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbDocumentBackend")
            .field("path", &self.env.path())
            .finish()
    }
}
