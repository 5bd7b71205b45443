//! Project progress sources.
//!
//! Every query tier implements [`ProjectProgressSource`]. Postgres-backed
//! tiers live in the API crate; [`MemoryProjectSource`] serves tests and
//! local runs without a database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use cometa_core::{
    completed_lengths_by_project, CometaResult, EntityId, ProgressQuery, Project, ProjectManager,
    ProjectWithProgress, QueryError, QueryTier, WorkEntryLength,
};

/// A way of loading projects with their aggregated progress.
///
/// Implementations must return an error when the backend is unavailable
/// rather than an empty list, so that the executor can fall through to the
/// next tier.
#[async_trait]
pub trait ProjectProgressSource: Send + Sync {
    /// Tier this source implements.
    fn tier(&self) -> QueryTier;

    /// Load the projects selected by `query`, ordered by start date
    /// descending, each with its completed length and percentage.
    async fn fetch_projects(&self, query: &ProgressQuery) -> CometaResult<Vec<ProjectWithProgress>>;
}

/// Order used by every tier: start date descending with undated projects
/// last, then id for a stable result.
pub fn compare_by_start_date_desc(a: &Project, b: &Project) -> Ordering {
    match (a.start_date, b.start_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Default)]
struct MemoryTables {
    projects: HashMap<EntityId, Project>,
    managers: HashMap<EntityId, ProjectManager>,
    work_entries: Vec<WorkEntryLength>,
}

/// In-memory tables behaving like the Postgres tiers.
#[derive(Debug)]
pub struct MemoryProjectSource {
    tier: QueryTier,
    tables: RwLock<MemoryTables>,
}

impl MemoryProjectSource {
    /// Create an empty source reporting as `tier`.
    pub fn new(tier: QueryTier) -> Self {
        Self {
            tier,
            tables: RwLock::new(MemoryTables::default()),
        }
    }

    pub fn insert_project(&self, project: Project) {
        self.write().projects.insert(project.id, project);
    }

    /// Register the manager for a `pm_user_id`.
    pub fn insert_manager(&self, user_id: EntityId, manager: ProjectManager) {
        self.write().managers.insert(user_id, manager);
    }

    pub fn insert_work_entry(&self, project_id: EntityId, meters_done_m: Option<f64>) {
        self.write().work_entries.push(WorkEntryLength {
            project_id,
            meters_done_m,
        });
    }

    pub fn project_count(&self) -> usize {
        self.read().projects.len()
    }

    /// Remove all rows.
    pub fn clear(&self) {
        *self.write() = MemoryTables::default();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryTables> {
        self.tables.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryTables> {
        self.tables.write().unwrap_or_else(|err| err.into_inner())
    }
}

#[async_trait]
impl ProjectProgressSource for MemoryProjectSource {
    fn tier(&self) -> QueryTier {
        self.tier
    }

    async fn fetch_projects(&self, query: &ProgressQuery) -> CometaResult<Vec<ProjectWithProgress>> {
        let tables = self.tables.read().map_err(|_| QueryError::Backend {
            tier: self.tier,
            reason: "table lock poisoned".to_string(),
        })?;

        let mut selected: Vec<&Project> = tables
            .projects
            .values()
            .filter(|p| query.matches(p.status))
            .collect();
        selected.sort_by(|a, b| compare_by_start_date_desc(a, b));

        let offset = usize::try_from(query.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit.max(0)).unwrap_or(usize::MAX);
        let completed = completed_lengths_by_project(&tables.work_entries);

        Ok(selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|project| {
                let manager = project
                    .pm_user_id
                    .and_then(|id| tables.managers.get(&id).cloned());
                let done = completed.get(&project.id).copied().unwrap_or(0.0);
                ProjectWithProgress::new(project.clone(), manager, done)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cometa_core::ProjectStatus;
    use uuid::Uuid;

    fn project(name: &str, start: Option<(i32, u32, u32)>, status: ProjectStatus, total: f64) -> Project {
        Project {
            id: Uuid::now_v7(),
            name: name.to_string(),
            customer: None,
            city: None,
            address: None,
            contact_24h: None,
            start_date: start.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            end_date_plan: None,
            status,
            total_length_m: total,
            base_rate_per_m: 12.5,
            pm_user_id: None,
            language_default: Some("de".to_string()),
        }
    }

    #[tokio::test]
    async fn test_filters_orders_and_aggregates() {
        let source = MemoryProjectSource::new(QueryTier::Optimized);
        let older = project("older", Some((2024, 5, 1)), ProjectStatus::Active, 500.0);
        let newer = project("newer", Some((2025, 1, 10)), ProjectStatus::Active, 200.0);
        let undated = project("undated", None, ProjectStatus::Active, 0.0);
        let closed = project("closed", Some((2025, 6, 1)), ProjectStatus::Closed, 100.0);

        for p in [&older, &newer, &undated, &closed] {
            source.insert_project(p.clone());
        }
        source.insert_work_entry(older.id, Some(100.0));
        source.insert_work_entry(older.id, Some(150.0));
        source.insert_work_entry(older.id, None);
        source.insert_work_entry(undated.id, Some(40.0));

        let rows = source.fetch_projects(&ProgressQuery::default()).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.project.name.as_str()).collect();
        assert_eq!(names, vec!["newer", "older", "undated"]);

        assert_eq!(rows[0].progress.completed_length_m, 0.0);
        assert_eq!(rows[1].progress.completed_length_m, 250.0);
        assert_eq!(rows[1].progress.progress_percentage, 50.0);
        // Zero planned length never divides.
        assert_eq!(rows[2].progress.progress_percentage, 0.0);
    }

    #[tokio::test]
    async fn test_limit_and_offset() {
        let source = MemoryProjectSource::new(QueryTier::Optimized);
        for day in 1..=5 {
            source.insert_project(project(
                &format!("p{day}"),
                Some((2025, 1, day)),
                ProjectStatus::Active,
                10.0,
            ));
        }

        let query = ProgressQuery::default().with_limit(2).with_offset(1);
        let rows = source.fetch_projects(&query).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.project.name.as_str()).collect();
        assert_eq!(names, vec!["p4", "p3"]);

        let all = ProgressQuery::default().with_status(None).with_limit(-1);
        assert!(source.fetch_projects(&all).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_joins_manager() {
        let source = MemoryProjectSource::new(QueryTier::Rpc);
        let pm = Uuid::now_v7();
        let mut p = project("with pm", Some((2025, 2, 2)), ProjectStatus::Active, 10.0);
        p.pm_user_id = Some(pm);
        source.insert_project(p);
        source.insert_manager(
            pm,
            ProjectManager {
                first_name: Some("Jana".to_string()),
                last_name: Some("Berg".to_string()),
            },
        );

        let rows = source.fetch_projects(&ProgressQuery::default()).await.unwrap();
        let manager = rows[0].pm_user.as_ref().unwrap();
        assert_eq!(manager.last_name.as_deref(), Some("Berg"));
        assert_eq!(source.tier(), QueryTier::Rpc);
    }

    #[test]
    fn test_clear() {
        let source = MemoryProjectSource::new(QueryTier::Optimized);
        source.insert_project(project("x", None, ProjectStatus::Draft, 1.0));
        assert_eq!(source.project_count(), 1);
        source.clear();
        assert_eq!(source.project_count(), 0);
    }
}
