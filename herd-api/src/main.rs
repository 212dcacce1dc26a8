//! HERD API Server Entry Point
//!
//! Loads configuration from the environment, builds the cached resource API
//! and serves it until Ctrl-C.

use herd_api::telemetry::{init_tracing, TelemetryConfig};
use herd_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, ResourceStore, ResponseCacheState,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = ApiConfig::from_env();
    config.validate()?;
    let addr = config.socket_addr()?;

    let cache = ResponseCacheState::new(config.cache.clone())?;
    let store = ResourceStore::new().with_read_latency(config.backend_read_latency);
    let app = create_router(AppState::new(store, cache), &config);

    tracing::info!(
        %addr,
        ttl_ms = config.cache.ttl.as_millis() as u64,
        gc_interval_secs = config.cache.gc_interval.as_secs(),
        coalescing = config.cache.coalescing_enabled,
        service = %telemetry_config.service_name,
        "Starting HERD API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
