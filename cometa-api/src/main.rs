//! COMETA API Server Entry Point
//!
//! Bootstraps configuration, the Postgres-backed query tiers and the
//! projects cache, then starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use cometa_api::constants::DEFAULT_PORT;
use cometa_api::telemetry::init_tracer;
use cometa_api::{
    create_api_router, postgres_executor, ApiConfig, ApiError, ApiResult, AppState, DbClient,
    DbConfig, ProjectsCache,
};
use cometa_storage::SystemClock;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let api_config = ApiConfig::from_env();
    init_tracer(&api_config.telemetry_config())?;
    api_config.validate()?;

    let db_config = DbConfig::from_env();
    let db = DbClient::from_config(&db_config)?;
    let executor = postgres_executor(&db);

    let cache = Arc::new(ProjectsCache::in_memory(
        api_config.cache_config(),
        Arc::new(SystemClock),
    ));

    tracing::info!(
        tiers = ?executor.tiers(),
        cache_ttl_secs = api_config.cache_ttl.as_secs(),
        environment = %api_config.environment,
        "Projects service configured"
    );

    let state = AppState::new(executor, cache, api_config);
    let app: Router = create_api_router(state);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting COMETA API server");

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

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("COMETA_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("COMETA_API_PORT").ok())
        .unwrap_or_else(|| DEFAULT_PORT.to_string());
    let port = port_str.parse::<u16>().map_err(|_| {
        ApiError::invalid_input(format!("Invalid port value: {}", port_str))
    })?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>().map_err(|e| {
        ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
    })
}
