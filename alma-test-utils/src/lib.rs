//! ALMA Test Utilities
//!
//! Centralized test infrastructure for the ALMA workspace:
//! - Mock document backends and source transports with call accounting
//! - Proptest generators for institutions and raw source items
//! - Test fixtures for common scenarios
//! - Custom assertions for resolver results

// Re-export the in-crate doubles from their source crates
pub use alma_storage::{InMemoryDocumentBackend, ManualClock};

// Re-export core types for convenience
pub use alma_core::{
    document_key, normalize_record, AlmaError, AlmaResult, Institution, ResolverConfig,
    SourceConfig, SourceError, StorageError,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alma_source::SourceTransport;
use alma_storage::DocumentBackend;
use async_trait::async_trait;
use serde_json::Value;

// ============================================================================
// MOCK DOCUMENT BACKEND
// ============================================================================

/// Document backend that records every call and can be told to fail.
///
/// Storage is delegated to an [`InMemoryDocumentBackend`], so successful
/// writes are visible to later reads.
#[derive(Debug, Default)]
pub struct RecordingDocumentBackend {
    inner: InMemoryDocumentBackend,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    range_calls: AtomicUsize,
    commit_calls: AtomicUsize,
    batches: Mutex<Vec<Vec<(String, Institution)>>>,
}

impl RecordingDocumentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with `records`.
    pub async fn seeded(records: &[Institution]) -> Self {
        let backend = Self::new();
        let batch: Vec<(String, Institution)> = records
            .iter()
            .map(|r| (r.document_key(), r.clone()))
            .collect();
        // The in-memory backend only fails on a poisoned lock.
        let _ = backend.inner.commit_merge_batch(&batch).await;
        backend
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    /// Every batch handed to `commit_merge_batch`, including failed ones.
    pub fn batches(&self) -> Vec<Vec<(String, Institution)>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<Institution> {
        self.inner.get(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl DocumentBackend for RecordingDocumentBackend {
    async fn range_by_name(
        &self,
        lower: &str,
        upper: &str,
        limit: usize,
    ) -> AlmaResult<Vec<Institution>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed {
                field: "name".to_string(),
                reason: "store unreachable".to_string(),
            }
            .into());
        }
        self.inner.range_by_name(lower, upper, limit).await
    }

    async fn commit_merge_batch(&self, batch: &[(String, Institution)]) -> AlmaResult<usize> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.to_vec());
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::CommitFailed {
                count: batch.len(),
                reason: "permission denied".to_string(),
            }
            .into());
        }
        self.inner.commit_merge_batch(batch).await
    }
}

// ============================================================================
// MOCK SOURCE TRANSPORT
// ============================================================================

/// Scripted source transport.
#[derive(Debug)]
pub struct MockSourceTransport {
    response: AlmaResult<Value>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockSourceTransport {
    /// Transport returning `body` for every query.
    pub fn returning(body: Value) -> Self {
        Self {
            response: Ok(body),
            delay: None,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Transport failing every query with `error`.
    pub fn failing(error: AlmaError) -> Self {
        Self {
            response: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Transport that never answers within any sane timeout.
    pub fn hanging() -> Self {
        Self::returning(Value::Array(Vec::new())).with_delay(Duration::from_secs(3600))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SourceTransport for MockSourceTransport {
    async fn fetch_json(&self, query: &str) -> AlmaResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for institution records.

    use super::*;
    use proptest::prelude::*;

    /// A plausible institution name: two to five capitalized words.
    pub fn arb_name() -> impl Strategy<Value = String> {
        prop::collection::vec("[A-Z][a-z]{2,9}", 2..=5).prop_map(|words| words.join(" "))
    }

    pub fn arb_state() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("West Bengal".to_string()),
            Just("Karnataka".to_string()),
            Just("Tamil Nadu".to_string()),
            Just("Maharashtra".to_string()),
            Just("Unknown".to_string()),
        ]
    }

    fn arb_optional_text() -> impl Strategy<Value = Option<String>> {
        prop::option::of("[A-Z][a-z]{3,12}")
    }

    /// Generate an [`Institution`] with a random mix of optional fields.
    pub fn arb_institution() -> impl Strategy<Value = Institution> {
        (
            arb_name(),
            arb_state(),
            arb_optional_text(),
            arb_optional_text(),
            prop::option::of(prop_oneof![
                Just("Private".to_string()),
                Just("Government".to_string()),
                Just("Autonomous".to_string()),
            ]),
        )
            .prop_map(|(name, state, city, university, kind)| Institution {
                name,
                state,
                city,
                university,
                kind,
            })
    }

    /// Generate a list of institutions with pairwise distinct document keys.
    pub fn arb_distinct_institutions(max: usize) -> impl Strategy<Value = Vec<Institution>> {
        prop::collection::vec(arb_institution(), 0..=max).prop_map(|records| {
            let mut seen = std::collections::HashSet::new();
            records
                .into_iter()
                .filter(|r| seen.insert(r.document_key()))
                .collect()
        })
    }

    /// Generate a raw source item using any accepted alias for each field.
    pub fn arb_raw_item() -> impl Strategy<Value = Value> {
        (
            arb_name(),
            prop::sample::select(vec!["name", "college name", "college_name"]),
            prop::option::of(arb_state()),
            arb_optional_text(),
            prop::sample::select(vec!["type", "college type"]),
            arb_optional_text(),
        )
            .prop_map(|(name, name_key, state, city, kind_key, kind)| {
                let mut object = serde_json::Map::new();
                object.insert(name_key.to_string(), Value::String(name));
                if let Some(state) = state {
                    object.insert("state".to_string(), Value::String(state));
                }
                if let Some(city) = city {
                    object.insert("city".to_string(), Value::String(city));
                }
                if let Some(kind) = kind {
                    object.insert(kind_key.to_string(), Value::String(kind));
                }
                Value::Object(object)
            })
    }

    /// A query of at least three characters drawn from name-like text.
    pub fn arb_query() -> impl Strategy<Value = String> {
        "[A-Za-z]{3}[A-Za-z ]{0,12}"
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use serde_json::json;

    pub fn techno_india_university() -> Institution {
        Institution::new("Techno India University", "West Bengal")
            .with_city("Kolkata")
            .with_kind("Private")
    }

    pub fn techno_india_college() -> Institution {
        Institution::new("Techno India College of Technology", "West Bengal")
            .with_city("Kolkata")
            .with_university("Maulana Abul Kalam Azad University of Technology")
    }

    pub fn st_xaviers() -> Institution {
        Institution::new("St. Xavier's College", "West Bengal").with_city("Kolkata")
    }

    /// The raw external payload for a "Techno India" lookup.
    pub fn techno_india_payload() -> Value {
        json!([
            {
                "name": "Techno India University",
                "state": "West Bengal",
                "city": "Kolkata",
                "type": "Private"
            },
            {
                "college name": "Techno India College of Technology",
                "state": "West Bengal",
                "city": "Kolkata",
                "university": "Maulana Abul Kalam Azad University of Technology"
            },
            { "name": "Unknown", "state": "West Bengal" },
            { "state": "Bihar" }
        ])
    }

    /// `count` distinct institutions named "Bulk College NNNN".
    pub fn bulk_institutions(count: usize) -> Vec<Institution> {
        (0..count)
            .map(|i| Institution::new(format!("Bulk College {:04}", i), "Karnataka"))
            .collect()
    }

    /// Enabled resolver configuration with the default TTL.
    pub fn enabled_resolver_config() -> ResolverConfig {
        ResolverConfig::new().with_enabled(true)
    }

    /// Enabled source configuration with the default timeout.
    pub fn enabled_source_config() -> SourceConfig {
        SourceConfig::new().with_enabled(true)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertions for institution results.

    use super::*;

    /// Assert that two result lists hold the same institutions, ignoring order.
    #[track_caller]
    pub fn assert_same_institutions(actual: &[Institution], expected: &[Institution]) {
        let mut actual_keys: Vec<String> = actual.iter().map(|i| i.document_key()).collect();
        let mut expected_keys: Vec<String> = expected.iter().map(|i| i.document_key()).collect();
        actual_keys.sort();
        expected_keys.sort();
        assert_eq!(actual_keys, expected_keys, "Institution sets differ");
    }

    /// Assert that every institution's name starts with `prefix` (byte-wise).
    #[track_caller]
    pub fn assert_all_prefixed(institutions: &[Institution], prefix: &str) {
        for institution in institutions {
            assert!(
                institution.name.starts_with(prefix),
                "{:?} does not start with {:?}",
                institution.name,
                prefix
            );
        }
    }

    /// Assert that an AlmaResult is a Source error.
    #[track_caller]
    pub fn assert_source_error<T: std::fmt::Debug>(result: &AlmaResult<T>) {
        match result {
            Err(AlmaError::Source(_)) => {}
            other => panic!("Expected Source error, got: {:?}", other),
        }
    }

    /// Assert that an AlmaResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &AlmaResult<T>) {
        match result {
            Err(AlmaError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Poll `condition` on the current runtime until it holds or `within` passes.
    pub async fn eventually<F>(within: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_payload_normalizes_to_two_records() {
        let payload = fixtures::techno_india_payload();
        let records: Vec<Institution> = payload
            .as_array()
            .expect("payload is an array")
            .iter()
            .filter_map(normalize_record)
            .collect();

        assertions::assert_same_institutions(
            &records,
            &[fixtures::techno_india_university(), fixtures::techno_india_college()],
        );
    }

    #[tokio::test]
    async fn test_recording_backend_counts_and_fails() {
        let backend = RecordingDocumentBackend::seeded(&[fixtures::st_xaviers()])
            .await
            .failing_writes();

        let found = backend
            .range_by_name("St", "St\u{f8ff}", 20)
            .await
            .expect("reads still work");
        assert_eq!(found.len(), 1);

        let result = backend
            .commit_merge_batch(&[("k".to_string(), fixtures::techno_india_college())])
            .await;
        assertions::assert_storage_error(&result);
        assert_eq!(backend.range_calls(), 1);
        assert_eq!(backend.commit_calls(), 1);
        assert_eq!(backend.batches().len(), 1);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_records_queries() {
        let transport = MockSourceTransport::returning(fixtures::techno_india_payload());
        let body = transport.fetch_json("Techno").await.expect("scripted body");

        assert!(body.is_array());
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.queries(), vec!["Techno".to_string()]);
    }

    #[test]
    fn test_bulk_fixture_keys_are_distinct() {
        let records = fixtures::bulk_institutions(450);
        let keys: std::collections::HashSet<String> =
            records.iter().map(|r| r.document_key()).collect();
        assert_eq!(keys.len(), 450);
    }

    proptest! {
        #[test]
        fn prop_raw_items_always_normalize(item in generators::arb_raw_item()) {
            let record = normalize_record(&item);
            prop_assert!(record.is_some());
            let record = record.unwrap();
            prop_assert!(!record.name.is_empty());
            prop_assert!(!record.state.is_empty());
        }

        #[test]
        fn prop_distinct_institutions_have_unique_keys(
            records in generators::arb_distinct_institutions(30)
        ) {
            let keys: std::collections::HashSet<String> =
                records.iter().map(|r| r.document_key()).collect();
            prop_assert_eq!(keys.len(), records.len());
        }
    }
}
