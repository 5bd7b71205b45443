//! Enum types for projects and query tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a construction project.
///
/// Mirrors the `check_project_status` constraint on the projects table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created but not yet started
    #[default]
    Draft,
    /// Work in progress
    Active,
    /// Field work finished, waiting for the customer invoice
    WaitingInvoice,
    /// Invoiced and archived
    Closed,
}

impl ProjectStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Active => "active",
            ProjectStatus::WaitingInvoice => "waiting_invoice",
            ProjectStatus::Closed => "closed",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ProjectStatus::Draft),
            "active" => Some(ProjectStatus::Active),
            "waiting_invoice" => Some(ProjectStatus::WaitingInvoice),
            "closed" => Some(ProjectStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s).ok_or_else(|| format!("unknown project status '{}'", s))
    }
}

/// One of the retrieval strategies for projects with progress.
///
/// Ordering follows attempt priority: the RPC tier is tried first and the
/// optimized (baseline) tier last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum QueryTier {
    /// Server-side stored procedure
    Rpc,
    /// Single round-trip aggregate query
    SuperOptimized,
    /// Projects query followed by one grouped aggregate query
    Optimized,
}

impl QueryTier {
    /// All tiers in attempt order.
    pub const ALL: [QueryTier; 3] = [QueryTier::Rpc, QueryTier::SuperOptimized, QueryTier::Optimized];

    /// Attempt priority, lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            QueryTier::Rpc => 0,
            QueryTier::SuperOptimized => 1,
            QueryTier::Optimized => 2,
        }
    }

    /// Stable label used in logs, headers and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryTier::Rpc => "rpc",
            QueryTier::SuperOptimized => "super-optimized",
            QueryTier::Optimized => "optimized",
        }
    }
}

impl fmt::Display for QueryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
