//! ALMA API Server Entry Point
//!
//! Bootstraps configuration, opens the persistent store and starts the Axum
//! HTTP server.

use alma_api::telemetry::{init_tracer, TelemetryConfig};
use alma_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};
use alma_core::AlmaConfig;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let api_config = ApiConfig::from_env();
    init_tracer(&TelemetryConfig::default().with_log_format(api_config.log_format))?;

    let alma_config = AlmaConfig::from_env();
    tracing::info!(
        fallback_enabled = alma_config.resolver.enabled,
        cache_ttl_ms = alma_config.resolver.cache_ttl.as_millis() as u64,
        source = %alma_config.source.base_url,
        "Configuration loaded"
    );

    let state = AppState::from_config(&alma_config)?;
    let app = create_api_router(state);

    let addr = api_config.socket_addr()?;
    tracing::info!(%addr, "Starting ALMA API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
