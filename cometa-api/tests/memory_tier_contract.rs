//! Contract test: every query tier returns the same rows for the same data.
//!
//! Runs against in-memory tables; `tier_contract.rs` repeats the check on
//! PostgreSQL behind the `db-tests` feature.

use std::sync::Arc;

use cometa_storage::{ProjectProgressSource, TieredQueryExecutor};
use cometa_test_utils::assertions::assert_percentages;
use cometa_test_utils::fixtures::contract_tiers;
use cometa_test_utils::*;

async fn fetch_all(
    sources: &[Arc<MemoryProjectSource>],
    query: &ProgressQuery,
) -> Vec<Vec<ProjectWithProgress>> {
    let mut results = Vec::new();
    for source in sources {
        results.push(source.fetch_projects(query).await.unwrap());
    }
    results
}

#[track_caller]
fn assert_tiers_agree(results: &[Vec<ProjectWithProgress>]) {
    for other in &results[1..] {
        assert_eq!(other, &results[0]);
    }
}

fn names(rows: &[ProjectWithProgress]) -> Vec<&str> {
    rows.iter().map(|r| r.project.name.as_str()).collect()
}

#[tokio::test]
async fn every_tier_returns_the_same_active_projects() {
    let sources = contract_tiers();
    let results = fetch_all(&sources, &ProgressQuery::default()).await;
    assert_tiers_agree(&results);

    let rows = &results[0];
    assert_eq!(
        names(rows),
        ["North trench", "Harbour loop", "Ring main", "Survey only"]
    );
    assert_percentages(rows, &[20.0, 50.0, 0.0, 25.0]);
    assert_eq!(rows[0].progress.completed_length_m, 100.0);
    assert_eq!(
        rows[0].pm_user,
        Some(ProjectManager {
            first_name: Some("Anna".to_string()),
            last_name: Some("Keller".to_string()),
        })
    );
    assert!(rows[1..].iter().all(|r| r.pm_user.is_none()));
}

#[tokio::test]
async fn every_tier_pages_the_same_way() {
    let sources = contract_tiers();
    let query = ProgressQuery::default().with_limit(2).with_offset(2);
    let results = fetch_all(&sources, &query).await;
    assert_tiers_agree(&results);
    assert_eq!(names(&results[0]), ["Ring main", "Survey only"]);

    let past_end = ProgressQuery::default().with_offset(10);
    let results = fetch_all(&sources, &past_end).await;
    assert_tiers_agree(&results);
    assert!(results[0].is_empty());
}

#[tokio::test]
async fn every_tier_agrees_without_status_filter() {
    let sources = contract_tiers();
    let query = ProgressQuery::default().with_status(None);
    let results = fetch_all(&sources, &query).await;
    assert_tiers_agree(&results);

    let rows = &results[0];
    assert_eq!(
        names(rows),
        ["North trench", "Harbour loop", "Ring main", "Old depot", "Survey only"]
    );
    assert_eq!(rows[3].project.status, ProjectStatus::Closed);
    assert_percentages(rows, &[20.0, 50.0, 0.0, 100.0, 25.0]);
}

#[tokio::test]
async fn executor_serves_the_primary_tier() {
    let sources = contract_tiers();
    let expected = sources[0]
        .fetch_projects(&ProgressQuery::default())
        .await
        .unwrap();

    let executor = TieredQueryExecutor::new(
        sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ProjectProgressSource>)
            .collect(),
    );
    let outcome = executor.execute(&ProgressQuery::default()).await.unwrap();
    assert_eq!(outcome.tier, QueryTier::Rpc);
    assert!(outcome.fallbacks.is_empty());
    assert_eq!(outcome.projects, expected);
}
