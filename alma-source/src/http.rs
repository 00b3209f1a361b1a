//! HTTP transport with client-side rate limiting

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use alma_core::constants::{DEFAULT_SOURCE_TIMEOUT_MS, SOURCE_NAME, SOURCE_QUERY_PARAM};
use alma_core::{invalid_response, rate_limited, request_failed, AlmaResult, SourceConfig};
use async_trait::async_trait;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::transport::SourceTransport;

/// Lookup API client with rate limiting.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    limiter: Arc<DefaultDirectRateLimiter>,
    requests_per_minute: u32,
    /// Longest we will queue for a slot before giving up with `RateLimited`.
    max_wait: Duration,
}

impl HttpTransport {
    /// Create a new transport.
    ///
    /// # Arguments
    /// * `base_url` - Lookup endpoint; the query is sent as the `name` parameter
    /// * `requests_per_minute` - Maximum requests per minute
    pub fn new(base_url: impl Into<String>, requests_per_minute: u32) -> Self {
        Self::with_client(Client::new(), base_url, requests_per_minute)
    }

    /// Create a transport around an existing reqwest client.
    pub fn with_client(client: Client, base_url: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        // Burst of one spreads requests evenly across the minute.
        let quota = Quota::per_minute(rpm).allow_burst(NonZeroU32::MIN);

        Self {
            client,
            base_url: base_url.into(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            requests_per_minute: rpm.get(),
            max_wait: Duration::from_millis(DEFAULT_SOURCE_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.base_url.clone(), config.requests_per_minute)
            .with_max_wait(config.timeout)
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Wait for a request slot, failing fast when the wait would exceed
    /// `max_wait`.
    async fn acquire_slot(&self) -> AlmaResult<()> {
        if let Err(not_until) = self.limiter.check() {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            if wait > self.max_wait {
                tracing::debug!(
                    wait_ms = wait.as_millis() as u64,
                    max_wait_ms = self.max_wait.as_millis() as u64,
                    "Rate limit wait exceeds budget"
                );
                return Err(rate_limited(SOURCE_NAME, wait.as_millis() as u64));
            }
            self.limiter.until_ready().await;
        }
        Ok(())
    }
}

#[async_trait]
impl SourceTransport for HttpTransport {
    async fn fetch_json(&self, query: &str) -> AlmaResult<Value> {
        self.acquire_slot().await?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[(SOURCE_QUERY_PARAM, query)])
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_failed(SOURCE_NAME, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => rate_limited(SOURCE_NAME, retry_after_ms),
                _ => request_failed(SOURCE_NAME, status.as_u16(), error_text),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| invalid_response(SOURCE_NAME, format!("Failed to read body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| invalid_response(SOURCE_NAME, format!("Body is not JSON: {}", e)))
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as u64)
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}
