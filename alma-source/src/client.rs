//! External source client.
//!
//! Bounds every call with a hard timeout and turns the loosely-shaped JSON
//! payload into typed institutions. The plain [`ExternalSourceClient::fetch_institutions`]
//! never fails; [`ExternalSourceClient::try_fetch_institutions`] surfaces the
//! cause for callers that report degradation.

use std::sync::Arc;
use std::time::Duration;

use alma_core::constants::SOURCE_NAME;
use alma_core::{
    invalid_response, normalize_record, AlmaResult, Institution, SourceConfig, SourceError,
};

use crate::http::HttpTransport;
use crate::transport::SourceTransport;

pub struct ExternalSourceClient {
    transport: Arc<dyn SourceTransport>,
    enabled: bool,
    timeout: Duration,
}

impl ExternalSourceClient {
    pub fn new(transport: Arc<dyn SourceTransport>, config: &SourceConfig) -> Self {
        Self {
            transport,
            enabled: config.enabled,
            timeout: config.timeout,
        }
    }

    /// Client over the rate-limited HTTP transport.
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(Arc::new(HttpTransport::from_config(config)), config)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch and normalize, surfacing failures.
    ///
    /// A disabled client returns `Ok` with no records and makes no call.
    pub async fn try_fetch_institutions(&self, query: &str) -> AlmaResult<Vec<Institution>> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        // Dropping the timed-out future cancels the in-flight request.
        let body = match tokio::time::timeout(self.timeout, self.transport.fetch_json(query)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(SourceError::Timeout {
                    source_name: SOURCE_NAME.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
                .into())
            }
        };

        let items = body
            .as_array()
            .ok_or_else(|| invalid_response(SOURCE_NAME, "expected a JSON array"))?;

        let institutions: Vec<Institution> = items.iter().filter_map(normalize_record).collect();
        let dropped = items.len() - institutions.len();
        if dropped > 0 {
            tracing::debug!(query, dropped, "Dropped unparseable source records");
        }

        Ok(institutions)
    }

    /// Fetch institutions matching `query` from the external API.
    ///
    /// Timeouts, non-success statuses, non-JSON bodies and non-array bodies
    /// all yield an empty list.
    pub async fn fetch_institutions(&self, query: &str) -> Vec<Institution> {
        match self.try_fetch_institutions(query).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    stage = "api",
                    query,
                    error = %e,
                    "External lookup failed, treating as empty"
                );
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for ExternalSourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSourceClient")
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .finish()
    }
}
