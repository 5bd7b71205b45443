//! Postgres-backed query tiers.
//!
//! Each tier adapts one [`DbClient`] read path to [`ProjectProgressSource`]
//! so the executor can fall through them in priority order.

use async_trait::async_trait;
use cometa_core::{CometaError, CometaResult, ProgressQuery, ProjectWithProgress, QueryError, QueryTier};
use cometa_storage::{ProjectProgressSource, TieredQueryExecutor};
use std::sync::Arc;

use crate::db::DbClient;
use crate::error::ApiError;

fn backend_error(tier: QueryTier, err: ApiError) -> CometaError {
    QueryError::Backend {
        tier,
        reason: err.describe(),
    }
    .into()
}

/// RPC tier: the `get_projects_with_progress_optimized` procedure.
#[derive(Clone)]
pub struct RpcProjectSource {
    db: DbClient,
}

impl RpcProjectSource {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectProgressSource for RpcProjectSource {
    fn tier(&self) -> QueryTier {
        QueryTier::Rpc
    }

    async fn fetch_projects(&self, query: &ProgressQuery) -> CometaResult<Vec<ProjectWithProgress>> {
        self.db
            .projects_with_progress_rpc(query)
            .await
            .map_err(|e| backend_error(QueryTier::Rpc, e))
    }
}

/// Super-optimized tier: a single joined aggregate statement.
#[derive(Clone)]
pub struct SuperOptimizedProjectSource {
    db: DbClient,
}

impl SuperOptimizedProjectSource {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectProgressSource for SuperOptimizedProjectSource {
    fn tier(&self) -> QueryTier {
        QueryTier::SuperOptimized
    }

    async fn fetch_projects(&self, query: &ProgressQuery) -> CometaResult<Vec<ProjectWithProgress>> {
        self.db
            .projects_with_progress_joined(query)
            .await
            .map_err(|e| backend_error(QueryTier::SuperOptimized, e))
    }
}

/// Optimized (baseline) tier: projects, then one grouped aggregate.
#[derive(Clone)]
pub struct OptimizedProjectSource {
    db: DbClient,
}

impl OptimizedProjectSource {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProjectProgressSource for OptimizedProjectSource {
    fn tier(&self) -> QueryTier {
        QueryTier::Optimized
    }

    async fn fetch_projects(&self, query: &ProgressQuery) -> CometaResult<Vec<ProjectWithProgress>> {
        self.db
            .projects_with_progress_two_step(query)
            .await
            .map_err(|e| backend_error(QueryTier::Optimized, e))
    }
}

/// All three Postgres tiers sharing one pool.
pub fn postgres_executor(db: &DbClient) -> TieredQueryExecutor {
    TieredQueryExecutor::new(vec![
        Arc::new(RpcProjectSource::new(db.clone())),
        Arc::new(SuperOptimizedProjectSource::new(db.clone())),
        Arc::new(OptimizedProjectSource::new(db.clone())),
    ])
}
