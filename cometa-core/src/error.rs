//! Error types for COMETA operations

use crate::QueryTier;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Why a single query tier could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierFailure {
    pub tier: QueryTier,
    pub reason: String,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tier, self.reason)
    }
}

/// Query backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("{tier} query failed: {reason}")]
    Backend { tier: QueryTier, reason: String },

    #[error("No query sources configured")]
    NoSources,

    #[error("All query tiers failed: {}", format_failures(.failures))]
    AllTiersFailed { failures: Vec<TierFailure> },
}

impl QueryError {
    /// Tier the error originated from, if it belongs to a single tier.
    pub fn tier(&self) -> Option<QueryTier> {
        match self {
            QueryError::Backend { tier, .. } => Some(*tier),
            QueryError::NoSources | QueryError::AllTiersFailed { .. } => None,
        }
    }
}

fn format_failures(failures: &[TierFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to serialize cache entry '{key}': {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize cache entry '{key}': {reason}")]
    Deserialization { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all COMETA errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CometaError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for COMETA operations.
pub type CometaResult<T> = Result<T, CometaError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = QueryError::Backend {
            tier: QueryTier::Rpc,
            reason: "function get_projects_with_progress_optimized does not exist".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("rpc query failed"));
        assert!(msg.contains("does not exist"));
        assert_eq!(err.tier(), Some(QueryTier::Rpc));
    }

    #[test]
    fn test_all_tiers_failed_lists_every_tier() {
        let err = QueryError::AllTiersFailed {
            failures: QueryTier::ALL
                .iter()
                .map(|tier| TierFailure {
                    tier: *tier,
                    reason: "connection refused".to_string(),
                })
                .collect(),
        };
        let msg = err.to_string();
        assert!(msg.contains("rpc: connection refused"));
        assert!(msg.contains("super-optimized: connection refused"));
        assert!(msg.contains("optimized: connection refused"));
        assert_eq!(err.tier(), None);
    }

    #[test]
    fn test_cometa_error_from_query_error() {
        let err: CometaError = QueryError::NoSources.into();
        assert!(matches!(err, CometaError::Query(QueryError::NoSources)));
        assert_eq!(err.to_string(), "Query error: No query sources configured");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "COMETA_CACHE_TTL_SECS".to_string(),
            value: "abc".to_string(),
            reason: "not a number".to_string(),
        };
        assert!(err.to_string().contains("COMETA_CACHE_TTL_SECS"));
    }
}
