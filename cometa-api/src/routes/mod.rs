//! REST API Routes Module
//!
//! Includes:
//! - `/optimized-projects` (GET/POST/OPTIONS)
//! - Health check endpoints under `/health`
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod health;
pub mod projects;

use std::time::Duration;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::constants::{
    HEADER_CACHE, HEADER_DATABASE_TIME, HEADER_OPTIMIZED, HEADER_QUERY_TIER, HEADER_TOTAL_TIME,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use projects::create_router as projects_router;

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static(HEADER_DATABASE_TIME),
            HeaderName::from_static(HEADER_TOTAL_TIME),
            HeaderName::from_static(HEADER_OPTIMIZED),
            HeaderName::from_static(HEADER_CACHE),
            HeaderName::from_static(HEADER_QUERY_TIER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// A CORS preflight carries `Access-Control-Request-Method`.
fn is_preflight(request: &Request) -> bool {
    request.method() == Method::OPTIONS
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// Route plain `OPTIONS` requests past the CORS layer.
///
/// `CorsLayer` answers every `OPTIONS` itself, which would hide the method
/// listing and the `?health=true` probe of `/optimized-projects`.
async fn plain_options_passthrough(
    State(routes): State<Router>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS && !is_preflight(&request) {
        request.extensions_mut().remove::<MatchedPath>();
        return routes.oneshot(request).await.into_response();
    }
    next.run(request).await
}

/// Create the complete API router.
///
/// - `/optimized-projects` for projects with progress
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    let routes = Router::new()
        .nest("/optimized-projects", projects::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    routes
        .clone()
        .layer(cors)
        .layer(from_fn_with_state(routes, plain_options_passthrough))
        .layer(from_fn(observability_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_preflight_detection() {
        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/optimized-projects")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        assert!(is_preflight(&preflight));

        let plain = Request::builder()
            .method(Method::OPTIONS)
            .uri("/optimized-projects")
            .body(Body::empty())
            .unwrap();
        assert!(!is_preflight(&plain));
    }

    #[test]
    fn test_cors_layer_builds_for_production_origins() {
        let mut config = ApiConfig::default().with_environment("production");
        config.cors_origins = vec!["https://cometa.app".to_string(), "not a header\n".to_string()];
        config.cors_allow_credentials = true;
        let _ = build_cors_layer(&config);
    }
}
