//! Database-backed contract test: all three query tiers return the same rows.
//!
//! Needs a disposable PostgreSQL database reachable through the
//! `COMETA_DB_*` variables. The test creates its own tables and truncates
//! them before seeding.

#![cfg(feature = "db-tests")]

use cometa_api::{
    ApiResult, DbClient, DbConfig, OptimizedProjectSource, RpcProjectSource,
    SuperOptimizedProjectSource,
};
use cometa_storage::{ProjectProgressSource, TieredQueryExecutor};
use cometa_test_utils::assertions::assert_percentages;
use cometa_test_utils::*;
use std::sync::Arc;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id uuid PRIMARY KEY,
    first_name text,
    last_name text
);
CREATE TABLE IF NOT EXISTS projects (
    id uuid PRIMARY KEY,
    name text NOT NULL,
    customer text,
    city text,
    address text,
    contact_24h text,
    start_date date,
    end_date_plan date,
    status text NOT NULL,
    total_length_m numeric,
    base_rate_per_m numeric,
    pm_user_id uuid REFERENCES users(id),
    language_default text
);
CREATE TABLE IF NOT EXISTS work_entries (
    id bigserial PRIMARY KEY,
    project_id uuid NOT NULL REFERENCES projects(id),
    meters_done_m numeric
);
CREATE OR REPLACE FUNCTION get_projects_with_progress_optimized(p_limit int, p_offset int)
RETURNS TABLE (
    id uuid, name text, customer text, city text, address text, contact_24h text,
    start_date date, end_date_plan date, status text,
    total_length_m numeric, base_rate_per_m numeric,
    pm_user_id uuid, language_default text,
    pm_first_name text, pm_last_name text,
    completed_length_m numeric, progress_percentage numeric
) LANGUAGE sql STABLE AS $$
    SELECT p.id, p.name, p.customer, p.city, p.address, p.contact_24h,
           p.start_date, p.end_date_plan, p.status,
           p.total_length_m, p.base_rate_per_m,
           p.pm_user_id, p.language_default,
           u.first_name, u.last_name,
           COALESCE(w.done, 0),
           CASE WHEN COALESCE(p.total_length_m, 0) > 0
                THEN ROUND(COALESCE(w.done, 0) / p.total_length_m * 100)
                ELSE 0 END
    FROM projects p
    LEFT JOIN users u ON u.id = p.pm_user_id
    LEFT JOIN (
        SELECT project_id, SUM(meters_done_m) AS done
        FROM work_entries
        WHERE meters_done_m IS NOT NULL
        GROUP BY project_id
    ) w ON w.project_id = p.id
    WHERE p.status = 'active'
    ORDER BY p.start_date DESC NULLS LAST, p.id
    LIMIT p_limit OFFSET p_offset
$$;
TRUNCATE work_entries, projects, users;
"#;

async fn seeded_db() -> ApiResult<DbClient> {
    let config = DbConfig::from_env();
    let pool = config.create_pool()?;
    {
        let conn = pool.get().await?;
        conn.batch_execute(SCHEMA).await?;

        let manager = uuid::Uuid::now_v7();
        conn.execute(
            "INSERT INTO users (id, first_name, last_name) VALUES ($1, 'Anna', 'Keller')",
            &[&manager],
        )
        .await?;

        // (name, start day in June 2025, planned m, work entries, status)
        let seeds: [(&str, u32, f64, &[Option<f64>], &str); 4] = [
            ("North trench", 28, 500.0, &[Some(60.0), Some(40.0), None], "active"),
            ("Harbour loop", 27, 500.0, &[Some(250.0)], "active"),
            ("Ring main", 26, 500.0, &[], "active"),
            ("Old depot", 25, 300.0, &[Some(300.0)], "closed"),
        ];

        for (i, (name, day, planned, entries, status)) in seeds.iter().enumerate() {
            let id = uuid::Uuid::now_v7();
            let start = chrono::NaiveDate::from_ymd_opt(2025, 6, *day);
            let pm = (i == 0).then_some(manager);
            conn.execute(
                "INSERT INTO projects (id, name, start_date, status, total_length_m, base_rate_per_m, pm_user_id) \
                 VALUES ($1, $2, $3, $4, $5::float8::numeric, 42, $6)",
                &[&id, name, &start, status, planned, &pm],
            )
            .await?;
            for meters in entries.iter() {
                conn.execute(
                    "INSERT INTO work_entries (project_id, meters_done_m) VALUES ($1, $2::float8::numeric)",
                    &[&id, meters],
                )
                .await?;
            }
        }
    }
    Ok(DbClient::new(pool))
}

#[tokio::test]
async fn every_tier_returns_the_same_projects() -> ApiResult<()> {
    let db = seeded_db().await?;
    let query = ProgressQuery::default();

    let sources: Vec<Arc<dyn ProjectProgressSource>> = vec![
        Arc::new(RpcProjectSource::new(db.clone())),
        Arc::new(SuperOptimizedProjectSource::new(db.clone())),
        Arc::new(OptimizedProjectSource::new(db.clone())),
    ];

    let mut results = Vec::new();
    for source in &sources {
        let rows = source
            .fetch_projects(&query)
            .await
            .map_err(cometa_api::ApiError::from)?;
        results.push(rows);
    }

    let rpc = &results[0];
    assert_eq!(rpc.len(), 3);
    assert_percentages(rpc, &[20.0, 50.0, 0.0]);
    assert_eq!(
        rpc[0].pm_user,
        Some(ProjectManager {
            first_name: Some("Anna".to_string()),
            last_name: Some("Keller".to_string()),
        })
    );
    assert!(rpc[1].pm_user.is_none());

    for other in &results[1..] {
        assert_eq!(other, rpc);
    }

    // The executor picks the first tier when the procedure exists.
    let outcome = TieredQueryExecutor::new(sources)
        .execute(&query)
        .await
        .map_err(cometa_api::ApiError::from)?;
    assert_eq!(outcome.tier, QueryTier::Rpc);
    assert!(outcome.fallbacks.is_empty());
    Ok(())
}
