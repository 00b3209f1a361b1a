//! Transport abstraction for the external lookup API.

use alma_core::AlmaResult;
use async_trait::async_trait;
use serde_json::Value;

/// Raw access to the third-party lookup endpoint.
///
/// Implementations return the decoded JSON body of one lookup and surface
/// every failure as an error; normalization and failure masking happen in
/// [`crate::ExternalSourceClient`].
#[async_trait]
pub trait SourceTransport: Send + Sync {
    /// Fetch the JSON body for a free-text name query.
    async fn fetch_json(&self, query: &str) -> AlmaResult<Value>;
}
