//! API Configuration Module
//!
//! Configuration for CORS, the projects cache and the projects query.
//! Configuration is loaded from environment variables with sensible
//! defaults for development.

use std::time::Duration;

use cometa_core::{ConfigError, ProgressQuery, ProjectStatus};
use cometa_storage::CacheConfig;

use crate::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_JOURNAL_RETENTION_SECS,
    DEFAULT_PROJECT_LIMIT,
};
use crate::telemetry::TelemetryConfig;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Deployment environment name. "production" or "prod" hides error
    /// details from responses.
    pub environment: String,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://cometa.app,https://app.cometa.app"
    pub cors_origins: Vec<String>,

    /// Whether to allow credentials in CORS requests.
    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Projects Cache / Query
    // ========================================================================
    /// Validity window of the projects cache entry.
    pub cache_ttl: Duration,

    /// How long tag invalidations are remembered.
    pub journal_retention: Duration,

    /// Page size of the projects query.
    pub project_limit: i64,

    /// Status filter of the projects query; `None` returns every status.
    pub project_status: Option<ProjectStatus>,

    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            cors_origins: Vec::new(), // Empty = allow all
            cors_allow_credentials: false,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            journal_retention: Duration::from_secs(DEFAULT_JOURNAL_RETENTION_SECS),
            project_limit: DEFAULT_PROJECT_LIMIT,
            project_status: Some(ProjectStatus::Active),
            log_json: false,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `COMETA_ENVIRONMENT`: "production" hides error details (default: development)
    /// - `COMETA_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `COMETA_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `COMETA_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `COMETA_CACHE_TTL_SECS`: Projects cache validity window (default: 300)
    /// - `COMETA_JOURNAL_RETENTION_SECS`: Invalidation journal retention (default: 3600)
    /// - `COMETA_PROJECT_LIMIT`: Projects per query (default: 20)
    /// - `COMETA_PROJECT_STATUS`: Status filter, or "all" (default: active)
    /// - `COMETA_LOG_JSON`: "true" or "1" for JSON log lines (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let environment = std::env::var("COMETA_ENVIRONMENT").unwrap_or(defaults.environment);

        let cors_origins = std::env::var("COMETA_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("COMETA_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let cors_max_age_secs = std::env::var("COMETA_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let cache_ttl = std::env::var("COMETA_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let journal_retention = std::env::var("COMETA_JOURNAL_RETENTION_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.journal_retention);

        let project_limit = std::env::var("COMETA_PROJECT_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|limit: &i64| *limit > 0)
            .unwrap_or(defaults.project_limit);

        let project_status = match std::env::var("COMETA_PROJECT_STATUS") {
            Ok(s) if s.eq_ignore_ascii_case("all") => None,
            Ok(s) => ProjectStatus::from_db_str(&s.to_lowercase()).or(defaults.project_status),
            Err(_) => defaults.project_status,
        };

        let log_json = std::env::var("COMETA_LOG_JSON")
            .map(|s| is_truthy(&s))
            .unwrap_or(false);

        Self {
            environment,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            cache_ttl,
            journal_retention,
            project_limit,
            project_status,
            log_json,
        }
    }

    /// Check if running in a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    /// Validate configuration for production use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.cors_origins.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "COMETA_CORS_ORIGINS".to_string(),
            });
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "COMETA_CACHE_TTL_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Logging settings for this process. Service name and version still
    /// come from their own variables.
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            environment: self.environment.clone(),
            log_json: self.log_json,
            ..TelemetryConfig::default()
        }
    }

    /// The one query this process serves.
    pub fn query(&self) -> ProgressQuery {
        ProgressQuery::default()
            .with_status(self.project_status)
            .with_limit(self.project_limit)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(self.cache_ttl)
            .with_journal_retention(self.journal_retention)
    }

    /// Chainable setters, used by tests and embedders.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1")
}
