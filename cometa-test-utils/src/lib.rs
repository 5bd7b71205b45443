//! COMETA Test Utilities
//!
//! Centralized test infrastructure for the COMETA workspace:
//! - Scripted query sources with call recording
//! - Proptest generators for projects and queries
//! - Test fixtures for common scenarios
//! - Custom assertions for query and progress results

// Re-export the in-memory source from its crate
pub use cometa_storage::MemoryProjectSource;

// Re-export core types for convenience
pub use cometa_core::{
    CometaError, CometaResult, EntityId, ProgressQuery, Project, ProjectManager, ProjectProgress,
    ProjectStatus, ProjectWithProgress, QueryError, QueryTier, TierFailure, Timestamp,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use cometa_storage::ProjectProgressSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// SCRIPTED SOURCES
// ============================================================================

/// Shared record of which tiers were called, in call order.
pub type CallLog = Arc<Mutex<Vec<QueryTier>>>;

/// Create an empty call log.
pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Read the tiers recorded so far.
pub fn logged_tiers(log: &CallLog) -> Vec<QueryTier> {
    log.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

/// A query source whose answer is set by the test.
///
/// Counts every call and optionally appends its tier to a shared
/// [`CallLog`], so tests can assert both "attempted exactly once" and
/// "attempted in this order".
#[derive(Debug)]
pub struct ScriptedSource {
    tier: QueryTier,
    rows: Mutex<Vec<ProjectWithProgress>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
    log: Option<CallLog>,
}

impl ScriptedSource {
    /// A source that returns `rows`.
    pub fn succeeding(tier: QueryTier, rows: Vec<ProjectWithProgress>) -> Self {
        Self {
            tier,
            rows: Mutex::new(rows),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            log: None,
        }
    }

    /// A source that fails with `reason`.
    pub fn failing(tier: QueryTier, reason: impl Into<String>) -> Self {
        let source = Self::succeeding(tier, Vec::new());
        source.fail_with(reason);
        source
    }

    /// Record calls into `log`.
    pub fn with_log(mut self, log: &CallLog) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    /// Wrap in an `Arc` ready for the executor.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Replace the rows returned on success.
    pub fn set_rows(&self, rows: Vec<ProjectWithProgress>) {
        *self.rows.lock().unwrap_or_else(|e| e.into_inner()) = rows;
    }

    /// Make subsequent calls fail.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    /// Make subsequent calls succeed again.
    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of `fetch_projects` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectProgressSource for ScriptedSource {
    fn tier(&self) -> QueryTier {
        self.tier
    }

    async fn fetch_projects(&self, _query: &ProgressQuery) -> CometaResult<Vec<ProjectWithProgress>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap_or_else(|e| e.into_inner()).push(self.tier);
        }

        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match failure {
            Some(reason) => Err(QueryError::Backend {
                tier: self.tier,
                reason,
            }
            .into()),
            None => Ok(self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()),
        }
    }
}

/// Upcast scripted sources for `TieredQueryExecutor::new`.
pub fn as_sources(sources: &[Arc<ScriptedSource>]) -> Vec<Arc<dyn ProjectProgressSource>> {
    sources
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn ProjectProgressSource>)
        .collect()
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating COMETA types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_project_status() -> impl Strategy<Value = ProjectStatus> {
        prop_oneof![
            Just(ProjectStatus::Draft),
            Just(ProjectStatus::Active),
            Just(ProjectStatus::WaitingInvoice),
            Just(ProjectStatus::Closed),
        ]
    }

    pub fn arb_query_tier() -> impl Strategy<Value = QueryTier> {
        prop_oneof![
            Just(QueryTier::Rpc),
            Just(QueryTier::SuperOptimized),
            Just(QueryTier::Optimized),
        ]
    }

    /// Lengths in meters, including zero.
    pub fn arb_length_m() -> impl Strategy<Value = f64> {
        prop_oneof![Just(0.0), 0.5f64..50_000.0]
    }

    /// Dates between 2020 and 2030.
    pub fn arb_start_date() -> impl Strategy<Value = Option<NaiveDate>> {
        prop::option::of((2020i32..2030, 1u32..=12, 1u32..=28))
            .prop_map(|d| d.and_then(|(y, m, day)| NaiveDate::from_ymd_opt(y, m, day)))
    }

    pub fn arb_project() -> impl Strategy<Value = Project> {
        (
            arb_uuid(),
            "[A-Z][a-z]{2,12}( [A-Z][a-z]{2,10})?",
            arb_start_date(),
            arb_project_status(),
            arb_length_m(),
        )
            .prop_map(|(id, name, start_date, status, total_length_m)| Project {
                id,
                start_date,
                status,
                total_length_m,
                ..fixtures::project(&name, total_length_m)
            })
    }

    /// Work-entry lengths for one project; `None` models a missing value.
    pub fn arb_work_entries() -> impl Strategy<Value = Vec<Option<f64>>> {
        prop::collection::vec(prop::option::weighted(0.9, 0.0f64..500.0), 0..8)
    }

    pub fn arb_progress_query() -> impl Strategy<Value = ProgressQuery> {
        (prop::option::of(arb_project_status()), 0i64..50, 0i64..10).prop_map(
            |(status, limit, offset)| ProgressQuery {
                status,
                limit,
                offset,
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// An active project with the given planned length.
    pub fn project(name: &str, total_length_m: f64) -> Project {
        Project {
            id: Uuid::now_v7(),
            name: name.to_string(),
            customer: Some("Stadtwerke Nord".to_string()),
            city: Some("Hamburg".to_string()),
            address: Some("Hafenstrasse 12".to_string()),
            contact_24h: Some("+49 40 000000".to_string()),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            end_date_plan: NaiveDate::from_ymd_opt(2025, 12, 31),
            status: ProjectStatus::Active,
            total_length_m,
            base_rate_per_m: 42.0,
            pm_user_id: None,
            language_default: Some("de".to_string()),
        }
    }

    /// Rows for `(completed, planned)` pairs, already in start-date order.
    pub fn progress_rows(lengths: &[(f64, f64)]) -> Vec<ProjectWithProgress> {
        lengths
            .iter()
            .enumerate()
            .map(|(i, (completed, planned))| {
                let mut p = project(&format!("Project {}", i + 1), *planned);
                p.start_date = start_date_for(i);
                ProjectWithProgress::new(p, None, *completed)
            })
            .collect()
    }

    /// Three projects of 500 m with 100, 250 and 0 m completed.
    pub fn three_projects_of_500() -> Vec<ProjectWithProgress> {
        progress_rows(&[(100.0, 500.0), (250.0, 500.0), (0.0, 500.0)])
    }

    /// An in-memory source seeded with one project per `(completed, planned)`
    /// pair. Each completed length is split over two work entries.
    pub fn seeded_memory_source(tier: QueryTier, lengths: &[(f64, f64)]) -> MemoryProjectSource {
        let source = MemoryProjectSource::new(tier);
        for (i, (completed, planned)) in lengths.iter().enumerate() {
            let mut p = project(&format!("Project {}", i + 1), *planned);
            p.start_date = start_date_for(i);
            let id = p.id;
            source.insert_project(p);
            source.insert_work_entry(id, Some(completed / 2.0));
            source.insert_work_entry(id, Some(completed / 2.0));
            source.insert_work_entry(id, None);
        }
        source
    }

    /// The same tables loaded into one in-memory source per tier.
    ///
    /// Active projects starting June 28, 27 and 26 (500 m each, with 100,
    /// 250 and 0 m done), a closed project starting June 25 (300 of 300 m)
    /// and an undated active project (50 of 200 m). Only the first project
    /// has a manager; its work entries include one without a length.
    pub fn contract_tiers() -> Vec<Arc<MemoryProjectSource>> {
        let manager_id = Uuid::now_v7();
        let seeds: [(&str, Option<u32>, f64, &[Option<f64>], ProjectStatus); 5] = [
            ("North trench", Some(28), 500.0, &[Some(60.0), Some(40.0), None], ProjectStatus::Active),
            ("Harbour loop", Some(27), 500.0, &[Some(250.0)], ProjectStatus::Active),
            ("Ring main", Some(26), 500.0, &[], ProjectStatus::Active),
            ("Old depot", Some(25), 300.0, &[Some(300.0)], ProjectStatus::Closed),
            ("Survey only", None, 200.0, &[Some(50.0)], ProjectStatus::Active),
        ];
        let projects: Vec<(Project, &[Option<f64>])> = seeds
            .iter()
            .enumerate()
            .map(|(i, (name, day, planned, entries, status))| {
                let mut p = project(name, *planned);
                p.start_date = day.and_then(|d| NaiveDate::from_ymd_opt(2025, 6, d));
                p.status = *status;
                p.pm_user_id = (i == 0).then_some(manager_id);
                (p, *entries)
            })
            .collect();

        QueryTier::ALL
            .iter()
            .map(|tier| {
                let source = MemoryProjectSource::new(*tier);
                source.insert_manager(
                    manager_id,
                    ProjectManager {
                        first_name: Some("Anna".to_string()),
                        last_name: Some("Keller".to_string()),
                    },
                );
                for (p, entries) in &projects {
                    source.insert_project(p.clone());
                    for meters in entries.iter() {
                        source.insert_work_entry(p.id, *meters);
                    }
                }
                Arc::new(source)
            })
            .collect()
    }

    /// Earlier index means later start date.
    fn start_date_for(index: usize) -> Option<NaiveDate> {
        let day = 28u32.saturating_sub(index as u32).max(1);
        NaiveDate::from_ymd_opt(2025, 6, day)
    }

    /// A scripted source per tier, all recording into one log.
    pub fn scripted_tiers(rows: Vec<ProjectWithProgress>) -> (Vec<Arc<ScriptedSource>>, CallLog) {
        let log = call_log();
        let sources = QueryTier::ALL
            .iter()
            .map(|tier| ScriptedSource::succeeding(*tier, rows.clone()).with_log(&log).shared())
            .collect();
        (sources, log)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for COMETA-specific validation.

    use super::*;

    /// Assert that every tier failed, in the given order.
    #[track_caller]
    pub fn assert_all_tiers_failed<T: std::fmt::Debug>(
        result: &CometaResult<T>,
        expected: &[QueryTier],
    ) {
        match result {
            Err(CometaError::Query(QueryError::AllTiersFailed { failures })) => {
                let tiers: Vec<QueryTier> = failures.iter().map(|f| f.tier).collect();
                assert_eq!(tiers, expected, "Wrong failure order");
            }
            other => panic!("Expected AllTiersFailed, got: {:?}", other),
        }
    }

    /// Assert progress percentages of `rows`, in order.
    #[track_caller]
    pub fn assert_percentages(rows: &[ProjectWithProgress], expected: &[f64]) {
        let actual: Vec<f64> = rows.iter().map(|r| r.progress.progress_percentage).collect();
        assert_eq!(actual.len(), expected.len(), "Wrong row count: {:?}", actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "Expected {:?}, got {:?}", expected, actual);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::fixtures::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_three_projects_fixture() {
        assert_percentages(&three_projects_of_500(), &[20.0, 50.0, 0.0]);
    }

    #[tokio::test]
    async fn test_seeded_memory_source_matches_rows() {
        let source = seeded_memory_source(QueryTier::Optimized, &[(100.0, 500.0), (250.0, 500.0)]);
        let rows = source.fetch_projects(&ProgressQuery::default()).await.unwrap();
        assert_percentages(&rows, &[20.0, 50.0]);
    }

    #[tokio::test]
    async fn test_scripted_source_counts_and_logs() {
        let log = call_log();
        let source = ScriptedSource::failing(QueryTier::Rpc, "boom").with_log(&log);

        assert!(source.fetch_projects(&ProgressQuery::default()).await.is_err());
        source.recover();
        assert!(source.fetch_projects(&ProgressQuery::default()).await.is_ok());

        assert_eq!(source.calls(), 2);
        assert_eq!(logged_tiers(&log), vec![QueryTier::Rpc, QueryTier::Rpc]);
    }

    proptest! {
        #[test]
        fn prop_generated_query_is_non_negative(query in generators::arb_progress_query()) {
            prop_assert!(query.limit >= 0);
            prop_assert!(query.offset >= 0);
        }

        #[test]
        fn prop_generated_project_has_name(project in generators::arb_project()) {
            prop_assert!(!project.name.is_empty());
            prop_assert!(project.total_length_m >= 0.0);
        }
    }
}
