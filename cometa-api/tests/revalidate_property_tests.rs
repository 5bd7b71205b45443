//! Property tests for the revalidation endpoint and served progress values.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use cometa_api::{create_api_router, ApiConfig, AppState, ProjectsCache};
use cometa_storage::{ManualClock, TieredQueryExecutor};
use cometa_test_utils::fixtures::{progress_rows, scripted_tiers};
use cometa_test_utils::*;
use proptest::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn app_with(rows: Vec<ProjectWithProgress>) -> Router {
    let config = ApiConfig::default();
    let (sources, _log) = scripted_tiers(rows);
    let cache = Arc::new(ProjectsCache::in_memory(
        config.cache_config(),
        Arc::new(ManualClock::starting_now()),
    ));
    let executor = TieredQueryExecutor::new(as_sources(&sources));
    create_api_router(AppState::new(executor, cache, config))
}

async fn post_status(app: &Router, body: String) -> StatusCode {
    let request = Request::post("/optimized-projects")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

/// Any JSON value for `revalidate` except the boolean `true`.
fn arb_non_true() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(Value::Bool(false)),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
        Just(json!(["true"])),
        Just(json!({ "revalidate": true })),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_revalidate_requires_boolean_true(flag in arb_non_true()) {
        let rt = runtime();
        let app = app_with(Vec::new());
        let status = rt.block_on(post_status(&app, json!({ "revalidate": flag }).to_string()));
        prop_assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn prop_revalidate_rejects_non_json(body in "[^{\\[\"0-9tfn -]{1,32}") {
        let rt = runtime();
        let app = app_with(Vec::new());
        let status = rt.block_on(post_status(&app, body));
        prop_assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn prop_served_progress_matches_lengths(
        lengths in prop::collection::vec((0.0f64..2_000.0, 0.0f64..1_000.0), 0..8)
    ) {
        let rt = runtime();
        let app = app_with(progress_rows(&lengths));

        let body: Value = rt.block_on(async {
            let request = Request::get("/optimized-projects").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            serde_json::from_slice(&bytes).unwrap()
        });

        let rows: Vec<ProjectWithProgress> = serde_json::from_value(body["data"].clone()).unwrap();
        prop_assert_eq!(rows.len(), lengths.len());
        for (row, (completed, planned)) in rows.iter().zip(&lengths) {
            let expected = if *planned > 0.0 { completed / planned * 100.0 } else { 0.0 };
            prop_assert!((row.progress.progress_percentage - expected).abs() <= 1e-9 * expected.max(1.0));
            prop_assert!(row.progress.progress_percentage >= 0.0);
        }
    }
}
