//! ALMA API - HTTP surface for the institution resolver
//!
//! A thin Axum layer over [`alma_resolver::Resolver`]: one search endpoint
//! mapping the resolver's list contract to HTTP, plus liveness checks.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, LogFormat};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
