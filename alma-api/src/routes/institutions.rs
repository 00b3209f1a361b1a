//! Institution search endpoint.
//!
//! `GET /api/institutions/search?q=<query>` answers with the resolver's list
//! as a JSON array, or `404` with a message body when nothing matched.

use axum::{
    extract::{Query, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response header naming the tier that served the result.
pub const TIER_HEADER: HeaderName = HeaderName::from_static("x-alma-tier");

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// GET /api/institutions/search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Response> {
    let query = params
        .q
        .ok_or_else(|| ApiError::invalid_input("Query parameter 'q' is required"))?;

    let resolution = state.resolver.lookup_detailed(&query).await;
    tracing::debug!(
        query = %query,
        tier = %resolution.source,
        results = resolution.institutions.len(),
        degraded = resolution.degraded,
        "Institution search served"
    );

    if resolution.is_empty() {
        return Err(ApiError::no_match());
    }

    let mut response = Json(resolution.institutions).into_response();
    response.headers_mut().insert(
        TIER_HEADER,
        HeaderValue::from_static(resolution.source.as_str()),
    );
    Ok(response)
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/search", get(search))
}
