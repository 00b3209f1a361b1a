//! HTTP routes

pub mod health;
pub mod institutions;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .nest("/health", health::create_router())
        .nest("/api/institutions", institutions::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
