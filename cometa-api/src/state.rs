//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use cometa_core::ProgressQuery;
use cometa_storage::{InMemoryCache, TieredQueryExecutor};

use crate::config::ApiConfig;

/// Cache holding the projects-with-progress snapshot.
///
/// One per process; invalidations do not reach other instances.
pub type ProjectsCache = InMemoryCache;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Query tiers in attempt order.
    pub executor: TieredQueryExecutor,
    pub cache: Arc<ProjectsCache>,
    pub config: Arc<ApiConfig>,
    /// The one query this process serves, so a fixed cache key is enough.
    pub query: ProgressQuery,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(executor: TieredQueryExecutor, cache: Arc<ProjectsCache>, config: ApiConfig) -> Self {
        Self {
            executor,
            cache,
            query: config.query(),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Instant, start_time);
