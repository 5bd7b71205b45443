//! Optimized Projects Endpoint
//!
//! `/optimized-projects` serves projects with progress through the cache
//! and the tiered query executor.
//!
//! - `GET` returns the cached (or freshly computed) snapshot with timing
//!   headers. `?health=true` probes the primary tier instead.
//! - `POST {"revalidate": true}` invalidates the projects and work-entries
//!   tags so the next `GET` recomputes.
//! - `OPTIONS` lists the methods, or runs the health probe with
//!   `?health=true`.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use cometa_core::{
    CometaError, CometaResult, HealthStatus, ProjectWithProgress, ProjectsSnapshot, QueryError,
    QueryTier, Timestamp,
};
use cometa_storage::CacheRead;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::constants::{
    HEADER_CACHE, HEADER_DATABASE_TIME, HEADER_OPTIMIZED, HEADER_QUERY_TIER, HEADER_TOTAL_TIME,
    PROJECTS_CACHE_KEY, PROJECTS_CACHE_TAGS, REVALIDATE_TAGS,
};
use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;
use crate::telemetry::with_metrics;

// ============================================================================
// TYPES
// ============================================================================

/// Query string of `/optimized-projects`.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ProjectsParams {
    /// `true` runs the health probe instead of the normal request
    pub health: Option<String>,
}

impl ProjectsParams {
    pub fn is_health_check(&self) -> bool {
        self.health.as_deref() == Some("true")
    }
}

/// Successful `GET` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProjectsResponse {
    pub data: Vec<ProjectWithProgress>,
    pub metadata: ProjectsMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProjectsMetadata {
    pub count: usize,
    /// Time of the query tier that produced the data, in ms
    pub execution_time: f64,
    /// Time spent in the handler, in ms
    pub total_time: f64,
    pub cached: bool,
    pub optimized: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    /// Whether this response was served from the cache
    pub cache_hit: bool,
    pub tier: QueryTier,
}

/// Failed `GET` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProjectsErrorResponse {
    pub error: String,
    /// Only outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<JsonValue>,
    pub metadata: ErrorMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    pub total_time: f64,
    pub optimized: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
}

/// Health probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<ServiceStatuses>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServiceStatuses {
    /// The database behind the primary tier
    pub supabase: HealthStatus,
    pub cache: String,
}

/// `POST` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RevalidateRequest {
    pub revalidate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RevalidateResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub timestamp: Option<Timestamp>,
}

/// `OPTIONS` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MethodsResponse {
    pub methods: Vec<String>,
    pub description: String,
}

// ============================================================================
// HELPERS
// ============================================================================

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// `Cache-Control` for shared caches: the validity window, plus twice that
/// for stale-while-revalidate.
pub fn cache_control(ttl_secs: u64) -> String {
    format!(
        "public, s-maxage={}, stale-while-revalidate={}",
        ttl_secs,
        ttl_secs.saturating_mul(2)
    )
}

/// Read the snapshot through the cache, running the tiers on a miss.
async fn load_snapshot(state: &AppState) -> CometaResult<CacheRead<ProjectsSnapshot>> {
    let executor = state.executor.clone();
    let query = state.query.clone();
    let policy = state.cache.policy().with_tags(PROJECTS_CACHE_TAGS);

    state
        .cache
        .get_or_compute(PROJECTS_CACHE_KEY, &policy, move || async move {
            match executor.execute(&query).await {
                Ok(outcome) => {
                    with_metrics(|m| {
                        m.record_query(outcome.tier, outcome.execution_time_ms, &outcome.fallbacks)
                    });
                    Ok(outcome.into_snapshot())
                }
                Err(err) => {
                    if let CometaError::Query(QueryError::AllTiersFailed { failures }) = &err {
                        with_metrics(|m| m.record_tier_failures(failures));
                    }
                    Err(err)
                }
            }
        })
        .await
}

/// Run the primary tier directly, bypassing the cache.
async fn service_health(state: &AppState) -> Response {
    let started = Instant::now();

    let probe = match state.executor.primary() {
        Some(source) => source.fetch_projects(&state.query).await.map(|_| ()),
        None => Err(QueryError::NoSources.into()),
    };

    match probe {
        Ok(()) => {
            let body = ServiceHealthResponse {
                status: HealthStatus::Healthy,
                optimized: Some(true),
                response_time: Some(format!("{}ms", elapsed_ms(started))),
                error: None,
                timestamp: Utc::now(),
                services: Some(ServiceStatuses {
                    supabase: HealthStatus::Healthy,
                    cache: "enabled".to_string(),
                }),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "Projects health check failed");
            let body = ServiceHealthResponse {
                status: HealthStatus::Unhealthy,
                optimized: None,
                response_time: None,
                error: Some("Service check failed".to_string()),
                timestamp: Utc::now(),
                services: None,
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /optimized-projects - Projects with progress
#[utoipa::path(
    get,
    path = "/optimized-projects",
    tag = "Projects",
    params(ProjectsParams),
    responses(
        (status = 200, description = "Projects with progress", body = ProjectsResponse),
        (status = 500, description = "Every query tier failed", body = ProjectsErrorResponse),
        (status = 503, description = "Health probe failed", body = ServiceHealthResponse),
    ),
)]
pub async fn get_projects(
    State(state): State<AppState>,
    Query(params): Query<ProjectsParams>,
) -> Response {
    if params.is_health_check() {
        return service_health(&state).await;
    }

    let started = Instant::now();

    match load_snapshot(&state).await {
        Ok(read) => {
            let cache_hit = read.was_cache_hit();
            with_metrics(|m| m.record_cache_lookup(cache_hit));

            let snapshot = read.into_value();
            let total_time = elapsed_ms(started);
            let execution_time = snapshot.execution_time_ms;
            let tier = snapshot.tier;

            tracing::info!(
                %tier,
                count = snapshot.projects.len(),
                execution_time_ms = execution_time,
                total_time_ms = total_time,
                cache_hit,
                "Projects served"
            );

            let headers = [
                ("cache-control", cache_control(state.config.cache_ttl.as_secs())),
                (HEADER_DATABASE_TIME, format!("{}ms", execution_time)),
                (HEADER_TOTAL_TIME, format!("{}ms", total_time)),
                (HEADER_OPTIMIZED, "true".to_string()),
                (HEADER_CACHE, if cache_hit { "HIT" } else { "MISS" }.to_string()),
                (HEADER_QUERY_TIER, tier.as_str().to_string()),
            ];

            let body = ProjectsResponse {
                metadata: ProjectsMetadata {
                    count: snapshot.projects.len(),
                    execution_time,
                    total_time,
                    cached: true,
                    optimized: true,
                    timestamp: Utc::now(),
                    cache_hit,
                    tier,
                },
                data: snapshot.projects,
            };

            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => {
            let total_time = elapsed_ms(started);
            tracing::error!(error = %err, total_time_ms = total_time, "Projects request failed");

            let api_error = ApiError::from(err);
            let status = api_error.status_code();
            let (error, details) = match api_error.code {
                ErrorCode::AllTiersFailed => (api_error.message, api_error.details),
                _ => (
                    ErrorCode::InternalError.default_message().to_string(),
                    Some(serde_json::json!({ "message": api_error.message })),
                ),
            };

            let body = ProjectsErrorResponse {
                error,
                details: if state.config.is_production() { None } else { details },
                metadata: ErrorMetadata {
                    total_time,
                    optimized: false,
                    timestamp: Utc::now(),
                },
            };
            (status, Json(body)).into_response()
        }
    }
}

/// POST /optimized-projects - Invalidate the projects cache
///
/// Anything other than a JSON object with `"revalidate": true` is rejected.
#[utoipa::path(
    post,
    path = "/optimized-projects",
    tag = "Projects",
    request_body = RevalidateRequest,
    responses(
        (status = 200, description = "Cache invalidated", body = RevalidateResponse),
        (status = 400, description = "Missing or invalid revalidate flag", body = RevalidateResponse),
        (status = 500, description = "Invalidation failed", body = RevalidateResponse),
    ),
)]
pub async fn revalidate(State(state): State<AppState>, body: Bytes) -> Response {
    let requested = match serde_json::from_slice::<JsonValue>(&body) {
        Ok(value) => value.get("revalidate").and_then(JsonValue::as_bool) == Some(true),
        Err(e) => {
            tracing::debug!(error = %e, "Revalidate body is not JSON");
            false
        }
    };

    if !requested {
        let body = RevalidateResponse {
            success: false,
            message: "Invalid request - missing revalidate parameter".to_string(),
            timestamp: None,
        };
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }

    match state.cache.invalidate_tags(&REVALIDATE_TAGS).await {
        Ok(removed) => {
            with_metrics(|m| REVALIDATE_TAGS.iter().for_each(|tag| m.record_invalidation(tag)));
            tracing::info!(removed, tags = ?REVALIDATE_TAGS, "Projects cache invalidated");
            let body = RevalidateResponse {
                success: true,
                message: "Cache invalidated successfully".to_string(),
                timestamp: Some(Utc::now()),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "Cache revalidation failed");
            let body = RevalidateResponse {
                success: false,
                message: "Failed to revalidate cache".to_string(),
                timestamp: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// OPTIONS /optimized-projects - Method discovery or health probe
#[utoipa::path(
    options,
    path = "/optimized-projects",
    tag = "Projects",
    params(ProjectsParams),
    responses(
        (status = 200, description = "Supported methods, or a healthy probe", body = MethodsResponse),
        (status = 503, description = "Health probe failed", body = ServiceHealthResponse),
    ),
)]
pub async fn options(State(state): State<AppState>, Query(params): Query<ProjectsParams>) -> Response {
    if params.is_health_check() {
        return service_health(&state).await;
    }

    let body = MethodsResponse {
        methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
        description: "Optimized Projects API with tiered query fallback".to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(get_projects).post(revalidate).options(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_control() {
        assert_eq!(cache_control(300), "public, s-maxage=300, stale-while-revalidate=600");
    }

    #[test]
    fn test_health_param() {
        let params = ProjectsParams { health: Some("true".to_string()) };
        assert!(params.is_health_check());
        let params = ProjectsParams { health: Some("1".to_string()) };
        assert!(!params.is_health_check());
        assert!(!ProjectsParams::default().is_health_check());
    }

    #[test]
    fn test_metadata_is_camel_case() {
        let metadata = ProjectsMetadata {
            count: 0,
            execution_time: 1.5,
            total_time: 2.0,
            cached: true,
            optimized: true,
            timestamp: Utc::now(),
            cache_hit: false,
            tier: QueryTier::SuperOptimized,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["executionTime"], 1.5);
        assert_eq!(json["cacheHit"], false);
        assert_eq!(json["tier"], "super-optimized");
    }

    #[test]
    fn test_unhealthy_body_shape() {
        let body = ServiceHealthResponse {
            status: HealthStatus::Unhealthy,
            optimized: None,
            response_time: None,
            error: Some("Service check failed".to_string()),
            timestamp: Utc::now(),
            services: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert!(json.get("services").is_none());
        assert!(json.get("responseTime").is_none());
    }
}
