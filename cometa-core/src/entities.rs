//! Core entity structures

use crate::{EntityId, ProjectStatus, QueryTier};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of projects returned per query.
pub const DEFAULT_PROJECT_LIMIT: i64 = 20;

/// A construction project as read from the projects table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Project {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    pub name: String,
    pub customer: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    /// 24h emergency contact
    pub contact_24h: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub start_date: Option<NaiveDate>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub end_date_plan: Option<NaiveDate>,
    pub status: ProjectStatus,
    /// Planned total length in meters
    pub total_length_m: f64,
    pub base_rate_per_m: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub pm_user_id: Option<EntityId>,
    pub language_default: Option<String>,
}

/// Display fields of the assigned project manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProjectManager {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProjectManager {
    /// Build from the joined user columns; `None` when the join found nobody.
    pub fn from_names(first_name: Option<String>, last_name: Option<String>) -> Option<Self> {
        if first_name.is_none() && last_name.is_none() {
            None
        } else {
            Some(Self {
                first_name,
                last_name,
            })
        }
    }
}

/// Aggregated progress of a project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProjectProgress {
    /// Sum of meters completed across all work entries
    pub completed_length_m: f64,
    /// completed / planned * 100, or 0 when nothing is planned
    pub progress_percentage: f64,
}

impl ProjectProgress {
    /// Compute progress from the completed and planned lengths.
    ///
    /// The percentage is not capped: over-delivery reports above 100.
    pub fn compute(completed_length_m: f64, total_length_m: f64) -> Self {
        let progress_percentage = if total_length_m > 0.0 {
            completed_length_m / total_length_m * 100.0
        } else {
            0.0
        };
        Self {
            completed_length_m,
            progress_percentage,
        }
    }
}

/// A project joined with its manager and aggregated progress.
///
/// This is the row shape every query tier must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProjectWithProgress {
    #[serde(flatten)]
    pub project: Project,
    pub pm_user: Option<ProjectManager>,
    pub progress: ProjectProgress,
}

impl ProjectWithProgress {
    /// Join a project with its completed length. Progress is derived here
    /// and nowhere else.
    pub fn new(project: Project, pm_user: Option<ProjectManager>, completed_length_m: f64) -> Self {
        let progress = ProjectProgress::compute(completed_length_m, project.total_length_m);
        Self {
            project,
            pm_user,
            progress,
        }
    }

    pub fn id(&self) -> EntityId {
        self.project.id
    }
}

/// Result of one successful query-tier run, as stored in the cache.
///
/// The time it was computed lives on the cache entry, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectsSnapshot {
    pub projects: Vec<ProjectWithProgress>,
    /// Tier that produced the rows
    pub tier: QueryTier,
    /// Wall-clock time of the successful tier only
    pub execution_time_ms: f64,
}

/// Parameters shared by all query tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressQuery {
    /// Only projects in this status; `None` returns every status
    pub status: Option<ProjectStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ProgressQuery {
    fn default() -> Self {
        Self {
            status: Some(ProjectStatus::Active),
            limit: DEFAULT_PROJECT_LIMIT,
            offset: 0,
        }
    }
}

impl ProgressQuery {
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_status(mut self, status: Option<ProjectStatus>) -> Self {
        self.status = status;
        self
    }

    /// Whether a project with the given status passes the filter.
    pub fn matches(&self, status: ProjectStatus) -> bool {
        self.status.map_or(true, |wanted| wanted == status)
    }
}

/// The only work-entry column this subsystem reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkEntryLength {
    pub project_id: EntityId,
    pub meters_done_m: Option<f64>,
}

/// Sum completed meters per project, skipping entries without a length.
pub fn completed_lengths_by_project(entries: &[WorkEntryLength]) -> HashMap<EntityId, f64> {
    let mut totals: HashMap<EntityId, f64> = HashMap::new();
    for entry in entries {
        if let Some(meters) = entry.meters_done_m {
            *totals.entry(entry.project_id).or_insert(0.0) += meters;
        }
    }
    totals
}
