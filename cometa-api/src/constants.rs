//! Constants for COMETA API
//!
//! This module contains all constant values used throughout the API.

use cometa_core::{TAG_PROJECTS, TAG_RPC_OPTIMIZED, TAG_WORK_ENTRIES};

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// PROJECTS CACHE
// ============================================================================

/// Cache key of the projects-with-progress collection
pub const PROJECTS_CACHE_KEY: &str = "projects-with-progress";

/// Tags stored with the projects cache entry
pub const PROJECTS_CACHE_TAGS: [&str; 3] = [TAG_PROJECTS, TAG_WORK_ENTRIES, TAG_RPC_OPTIMIZED];

/// Tags cleared by a manual revalidation request
pub const REVALIDATE_TAGS: [&str; 2] = [TAG_PROJECTS, TAG_WORK_ENTRIES];

/// Default validity window of the projects cache entry (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default retention of tag invalidations (1 hour)
pub const DEFAULT_JOURNAL_RETENTION_SECS: u64 = 3600;

/// Default number of projects per query
pub const DEFAULT_PROJECT_LIMIT: i64 = cometa_core::entities::DEFAULT_PROJECT_LIMIT;

// ============================================================================
// RESPONSE HEADERS
// ============================================================================

pub const HEADER_DATABASE_TIME: &str = "x-database-time";
pub const HEADER_TOTAL_TIME: &str = "x-total-time";
pub const HEADER_OPTIMIZED: &str = "x-optimized";
pub const HEADER_CACHE: &str = "x-cache";
pub const HEADER_QUERY_TIER: &str = "x-query-tier";

// ============================================================================
// SERVER
// ============================================================================

/// Default listen port
pub const DEFAULT_PORT: u16 = 3000;
