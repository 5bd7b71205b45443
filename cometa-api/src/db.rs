//! Database Connection Pool Module
//!
//! This module provides PostgreSQL connection pooling using deadpool-postgres
//! and the three read paths for projects with progress:
//!
//! - `get_projects_with_progress_optimized`: stored procedure (RPC tier)
//! - one statement joining projects, users and grouped work entries
//!   (super-optimized tier)
//! - projects first, then one grouped aggregate for their ids
//!   (optimized tier)
//!
//! Every path decodes rows through the same functions and derives progress
//! with [`ProjectWithProgress::new`], so the tiers agree on the result.

use crate::error::{ApiError, ApiResult};
use cometa_core::{
    EntityId, ProgressQuery, Project, ProjectManager, ProjectStatus, ProjectWithProgress,
};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::collections::HashMap;
use std::time::Duration;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "cometa".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("COMETA_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("COMETA_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("COMETA_DB_NAME").unwrap_or_else(|_| "cometa".to_string()),
            user: std::env::var("COMETA_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("COMETA_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("COMETA_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("COMETA_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; the first query does that.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SQL
// ============================================================================

const PROJECT_COLUMNS: &str = "p.id, p.name, p.customer, p.city, p.address, p.contact_24h, \
     p.start_date, p.end_date_plan, p.status, \
     p.total_length_m::float8 AS total_length_m, \
     p.base_rate_per_m::float8 AS base_rate_per_m, \
     p.pm_user_id, p.language_default, \
     u.first_name AS pm_first_name, u.last_name AS pm_last_name";

const RPC_SQL: &str = "SELECT id, name, customer, city, address, contact_24h, \
     start_date, end_date_plan, status, \
     total_length_m::float8 AS total_length_m, \
     base_rate_per_m::float8 AS base_rate_per_m, \
     pm_user_id, language_default, pm_first_name, pm_last_name, \
     COALESCE(completed_length_m, 0)::float8 AS completed_length_m \
     FROM get_projects_with_progress_optimized($1::int, $2::int)";

fn super_optimized_sql() -> String {
    format!(
        "SELECT {PROJECT_COLUMNS}, COALESCE(w.completed_length_m, 0)::float8 AS completed_length_m \
         FROM projects p \
         LEFT JOIN users u ON u.id = p.pm_user_id \
         LEFT JOIN ( \
             SELECT project_id, SUM(meters_done_m) AS completed_length_m \
             FROM work_entries \
             WHERE meters_done_m IS NOT NULL \
             GROUP BY project_id \
         ) w ON w.project_id = p.id \
         WHERE ($1::text IS NULL OR p.status = $1::text) \
         ORDER BY p.start_date DESC NULLS LAST, p.id \
         LIMIT $2 OFFSET $3"
    )
}

fn projects_sql() -> String {
    format!(
        "SELECT {PROJECT_COLUMNS} \
         FROM projects p \
         LEFT JOIN users u ON u.id = p.pm_user_id \
         WHERE ($1::text IS NULL OR p.status = $1::text) \
         ORDER BY p.start_date DESC NULLS LAST, p.id \
         LIMIT $2 OFFSET $3"
    )
}

const COMPLETED_LENGTHS_SQL: &str = "SELECT project_id, SUM(meters_done_m)::float8 AS completed_length_m \
     FROM work_entries \
     WHERE project_id = ANY($1) AND meters_done_m IS NOT NULL \
     GROUP BY project_id";

// ============================================================================
// ROW DECODING
// ============================================================================

fn project_from_row(row: &Row) -> ApiResult<Project> {
    let status: String = row.try_get("status")?;
    let status = ProjectStatus::from_db_str(&status).ok_or_else(|| {
        ApiError::database_error(format!("Unknown project status '{}'", status))
    })?;

    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        customer: row.try_get("customer")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        contact_24h: row.try_get("contact_24h")?,
        start_date: row.try_get("start_date")?,
        end_date_plan: row.try_get("end_date_plan")?,
        status,
        total_length_m: row.try_get::<_, Option<f64>>("total_length_m")?.unwrap_or(0.0),
        base_rate_per_m: row.try_get::<_, Option<f64>>("base_rate_per_m")?.unwrap_or(0.0),
        pm_user_id: row.try_get("pm_user_id")?,
        language_default: row.try_get("language_default")?,
    })
}

fn manager_from_row(row: &Row) -> ApiResult<Option<ProjectManager>> {
    Ok(ProjectManager::from_names(
        row.try_get("pm_first_name")?,
        row.try_get("pm_last_name")?,
    ))
}

/// Decode a row that carries its own `completed_length_m` column.
fn progress_from_row(row: &Row) -> ApiResult<ProjectWithProgress> {
    let completed: f64 = row.try_get("completed_length_m")?;
    Ok(ProjectWithProgress::new(
        project_from_row(row)?,
        manager_from_row(row)?,
        completed,
    ))
}

fn to_i32(value: i64) -> i32 {
    i32::try_from(value.max(0)).unwrap_or(i32::MAX)
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool and provides the
/// projects-with-progress queries.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(ApiError::from)
    }

    // ========================================================================
    // PROJECTS WITH PROGRESS
    // ========================================================================

    /// Call the `get_projects_with_progress_optimized` stored procedure.
    ///
    /// The procedure applies its own status filter; only limit and offset
    /// are passed. Its percentage column is ignored.
    pub async fn projects_with_progress_rpc(
        &self,
        query: &ProgressQuery,
    ) -> ApiResult<Vec<ProjectWithProgress>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(RPC_SQL, &[&to_i32(query.limit), &to_i32(query.offset)])
            .await?;

        rows.iter().map(progress_from_row).collect()
    }

    /// One round trip: projects, managers and grouped work-entry sums.
    pub async fn projects_with_progress_joined(
        &self,
        query: &ProgressQuery,
    ) -> ApiResult<Vec<ProjectWithProgress>> {
        let conn = self.get_conn().await?;
        let status = query.status.map(|s| s.as_db_str());
        let rows = conn
            .query(
                super_optimized_sql().as_str(),
                &[&status, &query.limit.max(0), &query.offset.max(0)],
            )
            .await?;

        rows.iter().map(progress_from_row).collect()
    }

    /// Two round trips: the projects page, then the completed lengths of
    /// exactly those projects.
    pub async fn projects_with_progress_two_step(
        &self,
        query: &ProgressQuery,
    ) -> ApiResult<Vec<ProjectWithProgress>> {
        let conn = self.get_conn().await?;
        let status = query.status.map(|s| s.as_db_str());
        let rows = conn
            .query(
                projects_sql().as_str(),
                &[&status, &query.limit.max(0), &query.offset.max(0)],
            )
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let projects = rows
            .iter()
            .map(|row| -> ApiResult<(Project, Option<ProjectManager>)> {
                Ok((project_from_row(row)?, manager_from_row(row)?))
            })
            .collect::<ApiResult<Vec<_>>>()?;

        let ids: Vec<EntityId> = projects.iter().map(|(p, _)| p.id).collect();
        let sums = conn.query(COMPLETED_LENGTHS_SQL, &[&ids]).await?;
        let mut completed: HashMap<EntityId, f64> = HashMap::with_capacity(sums.len());
        for row in &sums {
            completed.insert(row.try_get("project_id")?, row.try_get("completed_length_m")?);
        }

        Ok(projects
            .into_iter()
            .map(|(project, manager)| {
                let done = completed.get(&project.id).copied().unwrap_or(0.0);
                ProjectWithProgress::new(project, manager, done)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "cometa");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_sql_orders_nulls_last() {
        for sql in [super_optimized_sql(), projects_sql()] {
            assert!(sql.contains("ORDER BY p.start_date DESC NULLS LAST, p.id"));
            assert!(sql.contains("LEFT JOIN users u ON u.id = p.pm_user_id"));
        }
        assert!(super_optimized_sql().contains("GROUP BY project_id"));
        assert!(COMPLETED_LENGTHS_SQL.contains("= ANY($1)"));
        assert!(RPC_SQL.contains("get_projects_with_progress_optimized($1::int, $2::int)"));
    }

    #[test]
    fn test_to_i32_clamps() {
        assert_eq!(to_i32(-5), 0);
        assert_eq!(to_i32(20), 20);
        assert_eq!(to_i32(i64::MAX), i32::MAX);
    }

    #[tokio::test]
    async fn test_pool_creation_is_lazy() {
        // No server is needed until a connection is requested.
        let client = DbClient::from_config(&DbConfig::default()).unwrap();
        assert_eq!(client.pool.status().size, 0);
    }
}
