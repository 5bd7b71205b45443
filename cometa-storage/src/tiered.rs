//! Tiered query execution.
//!
//! Sources are tried in tier priority order. The first success wins; every
//! failure before it is logged and reported back as a fallback.

use std::sync::Arc;
use std::time::Instant;

use cometa_core::{
    CometaResult, ProgressQuery, ProjectWithProgress, ProjectsSnapshot, QueryError, QueryTier,
    TierFailure,
};
use tracing::{debug, warn};

use crate::source::ProjectProgressSource;

/// Result of a successful tiered query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub projects: Vec<ProjectWithProgress>,
    /// Tier that produced the rows
    pub tier: QueryTier,
    /// Wall-clock time of the successful tier only
    pub execution_time_ms: f64,
    /// Tiers that failed before the successful one, in attempt order
    pub fallbacks: Vec<TierFailure>,
}

impl QueryOutcome {
    pub fn into_snapshot(self) -> ProjectsSnapshot {
        ProjectsSnapshot {
            projects: self.projects,
            tier: self.tier,
            execution_time_ms: self.execution_time_ms,
        }
    }
}

/// Runs a query against a priority-ordered list of sources.
#[derive(Clone)]
pub struct TieredQueryExecutor {
    sources: Vec<Arc<dyn ProjectProgressSource>>,
}

impl std::fmt::Debug for TieredQueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredQueryExecutor")
            .field("tiers", &self.tiers())
            .finish()
    }
}

impl TieredQueryExecutor {
    /// Build an executor. Sources are sorted by tier priority; the relative
    /// order of sources sharing a tier is kept.
    pub fn new(mut sources: Vec<Arc<dyn ProjectProgressSource>>) -> Self {
        sources.sort_by_key(|s| s.tier().priority());
        Self { sources }
    }

    /// Tiers in attempt order.
    pub fn tiers(&self) -> Vec<QueryTier> {
        self.sources.iter().map(|s| s.tier()).collect()
    }

    /// The highest-priority source, used for health probes.
    pub fn primary(&self) -> Option<&Arc<dyn ProjectProgressSource>> {
        self.sources.first()
    }

    /// Try each tier once, in order, until one succeeds.
    ///
    /// Returns [`QueryError::AllTiersFailed`] with every tier's reason when
    /// nothing succeeds, or [`QueryError::NoSources`] when empty.
    pub async fn execute(&self, query: &ProgressQuery) -> CometaResult<QueryOutcome> {
        if self.sources.is_empty() {
            return Err(QueryError::NoSources.into());
        }

        let mut fallbacks = Vec::new();
        for source in &self.sources {
            let tier = source.tier();
            let started = Instant::now();
            match source.fetch_projects(query).await {
                Ok(projects) => {
                    let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                    debug!(
                        %tier,
                        count = projects.len(),
                        execution_time_ms,
                        fallbacks = fallbacks.len(),
                        "query tier succeeded"
                    );
                    return Ok(QueryOutcome {
                        projects,
                        tier,
                        execution_time_ms,
                        fallbacks,
                    });
                }
                Err(e) => {
                    warn!(%tier, error = %e, "query tier failed, falling back");
                    fallbacks.push(TierFailure {
                        tier,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(QueryError::AllTiersFailed {
            failures: fallbacks,
        }
        .into())
    }
}
