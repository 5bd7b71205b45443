//! COMETA Core - Entity Types
//!
//! Pure data structures shared by the storage and API crates: projects,
//! progress aggregates, query parameters, health types and the error
//! taxonomy. This crate contains no I/O.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod entities;
pub mod enums;
pub mod error;
pub mod health;

pub use entities::{
    completed_lengths_by_project, ProgressQuery, Project, ProjectManager, ProjectProgress,
    ProjectWithProgress, ProjectsSnapshot, WorkEntryLength,
};
pub use enums::{ProjectStatus, QueryTier};
pub use error::{CacheError, CometaError, CometaResult, ConfigError, QueryError, TierFailure};
pub use health::HealthStatus;

/// Entity identifier. Project rows are keyed by UUID.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Cache tag for anything derived from the projects table.
pub const TAG_PROJECTS: &str = "projects";

/// Cache tag for anything derived from the work_entries table.
pub const TAG_WORK_ENTRIES: &str = "work-entries";

/// Cache tag for results produced through the optimized RPC path.
pub const TAG_RPC_OPTIMIZED: &str = "rpc-optimized";
