//! OpenAPI Specification for COMETA API
//!
//! Generated by utoipa from the route annotations and response types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{self, HealthDetails, HealthResponse};
use crate::routes::projects::{
    self, ErrorMetadata, MethodsResponse, ProjectsErrorResponse, ProjectsMetadata,
    ProjectsResponse, RevalidateRequest, RevalidateResponse, ServiceHealthResponse,
    ServiceStatuses,
};
use crate::telemetry::metrics;

use cometa_core::{
    HealthStatus, Project, ProjectManager, ProjectProgress, ProjectStatus, ProjectWithProgress,
    QueryTier,
};

/// OpenAPI document for COMETA API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "COMETA API",
        version = "0.4.0",
        description = "Construction management backend - optimized project queries",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(name = "COMETA", url = "https://cometa.app")
    ),
    servers(
        (url = "https://api.cometa.app", description = "Production"),
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Projects", description = "Projects with progress, cached and tier-optimized"),
        (name = "Health", description = "Liveness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        projects::get_projects,
        projects::revalidate,
        projects::options,
        health::ping,
        health::liveness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // Domain
            Project,
            ProjectManager,
            ProjectProgress,
            ProjectWithProgress,
            ProjectStatus,
            QueryTier,
            HealthStatus,
            // Responses
            ProjectsResponse,
            ProjectsMetadata,
            ProjectsErrorResponse,
            ErrorMetadata,
            ServiceHealthResponse,
            ServiceStatuses,
            RevalidateRequest,
            RevalidateResponse,
            MethodsResponse,
            HealthResponse,
            HealthDetails,
            // Errors
            ApiError,
            ErrorCode,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "COMETA API");

        let servers = openapi
            .servers
            .as_ref()
            .ok_or_else(|| "OpenAPI servers missing".to_string())?;
        assert_eq!(servers.len(), 2);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.schemas.contains_key("ProjectWithProgress"));
        assert!(components.schemas.contains_key("ProjectsResponse"));
        Ok(())
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("COMETA API"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        let projects = paths
            .get("/optimized-projects")
            .ok_or_else(|| "projects path missing".to_string())?;
        assert!(projects.get.is_some());
        assert!(projects.post.is_some());
        assert!(projects.options.is_some());

        assert!(paths.contains_key("/health/ping"));
        assert!(paths.contains_key("/health/live"));
        assert!(paths.contains_key("/metrics"));
        Ok(())
    }

    #[test]
    fn test_timestamps_documented_as_date_time() -> Result<(), String> {
        let doc = serde_json::to_value(ApiDoc::openapi()).map_err(|e| e.to_string())?;
        for schema in [
            "ProjectsMetadata",
            "ErrorMetadata",
            "ServiceHealthResponse",
            "RevalidateResponse",
        ] {
            let timestamp = &doc["components"]["schemas"][schema]["properties"]["timestamp"];
            assert_eq!(timestamp["format"], "date-time", "{schema}.timestamp");
        }
        Ok(())
    }
}
