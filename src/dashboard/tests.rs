//! Handler tests for the dashboard router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use camino::Utf8PathBuf;
use rstest::rstest;
use tempfile::TempDir;
use tower::ServiceExt;

use super::*;
use crate::provider::TableSummary;
use crate::state::StateDocument;
use crate::test_support::FakeCloud;

const FAST: PollWindow = PollWindow {
    interval: Duration::from_millis(1),
    timeout: Duration::from_millis(20),
};

fn seeded_store(tmp: &TempDir) -> StateStore {
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("run_data.json"))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    let store = StateStore::new(path);
    store
        .save(&StateDocument::seed("us-west-1", "us-east-1"))
        .unwrap_or_else(|err| panic!("seed state: {err}"));
    store
}

fn app(cloud: &FakeCloud, tmp: &TempDir) -> Router {
    let state = DashboardState::new(Arc::new(cloud.clone()), seeded_store(tmp))
        .with_query_poll(FAST);
    router(state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap_or_else(|err| panic!("request: {err}")),
        )
        .await
        .unwrap_or_else(|err| panic!("oneshot: {err}"));
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|err| panic!("body: {err}"));
    let value = serde_json::from_slice(&bytes).unwrap_or_else(|err| panic!("json: {err}"));
    (status, value)
}

#[rstest]
#[tokio::test]
async fn health_reports_healthy() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let (status, body) = get_json(app(&cloud, &tmp), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[rstest]
#[tokio::test]
async fn index_serves_the_embedded_page() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let response = app(&cloud, &tmp)
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap_or_else(|err| panic!("request: {err}")),
        )
        .await
        .unwrap_or_else(|err| panic!("oneshot: {err}"));

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_else(|err| panic!("body: {err}"));
    let page = String::from_utf8_lossy(&bytes);
    assert!(page.contains("Customers by country"));
}

#[rstest]
#[tokio::test]
async fn empty_catalog_is_a_structured_error_not_a_fault() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let (status, body) = get_json(app(&cloud, &tmp), "/api/customer-data").await;

    assert_eq!(status, StatusCode::OK);
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("no tables found"), "error: {error}");
}

#[rstest]
#[tokio::test]
async fn provider_fault_returns_a_500_with_the_message() {
    let cloud = FakeCloud::new();
    cloud.inject_failure(
        "list_tables",
        ProviderError::other("list_tables", "access denied"),
    );
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let (status, body) = get_json(app(&cloud, &tmp), "/api/customer-data").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("access denied"), "error: {error}");
}

#[rstest]
#[tokio::test]
async fn aggregates_counts_per_country() {
    let cloud = FakeCloud::new();
    cloud.seed_tables(
        "caravan_catalog",
        vec![TableSummary {
            name: String::from("caravan_customers"),
            column_count: 3,
        }],
    );
    cloud.seed_query_rows(vec![
        vec![String::from("country"), String::from("customer_count")],
        vec![String::from("GB"), String::from("12")],
        vec![String::from("SG"), String::from("7")],
    ]);
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let (status, body) = get_json(app(&cloud, &tmp), "/api/customer-data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 19);
    assert_eq!(body["countries"][0]["country"], "GB");
    assert_eq!(body["countries"][0]["count"], 12);
    assert_eq!(body["countries"][1]["country"], "SG");
    assert!(body["query_time"].is_number());
}

#[rstest]
#[tokio::test]
async fn failed_query_is_a_structured_error() {
    let cloud = FakeCloud::new();
    cloud.seed_tables(
        "caravan_catalog",
        vec![TableSummary {
            name: String::from("caravan_customers"),
            column_count: 3,
        }],
    );
    cloud.fail_next_query("TABLE_NOT_FOUND");
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    let (status, body) = get_json(app(&cloud, &tmp), "/api/customer-data").await;

    assert_eq!(status, StatusCode::OK);
    let error = body["error"].as_str().unwrap_or_default();
    assert!(error.contains("query failed"), "error: {error}");
}

#[rstest]
#[tokio::test]
async fn missing_state_document_is_a_fault() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("absent.json"))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
    let state = DashboardState::new(Arc::new(cloud), StateStore::new(path)).with_query_poll(FAST);

    let (status, body) = get_json(router(state), "/api/customer-data").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap_or_default().contains("state"));
}

#[rstest]
fn country_query_groups_and_orders() {
    let sql = country_query("caravan_catalog", "caravan_customers");
    assert!(sql.contains("GROUP BY country"));
    assert!(sql.contains("ORDER BY customer_count DESC"));
    assert!(sql.contains("\"caravan_catalog\".\"caravan_customers\""));
}
