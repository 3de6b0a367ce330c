//! Unit tests for the pipeline exerciser.

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::provider::{LogEvent, TableSummary};
use crate::provision::{
    AnalyticsProvisioner, CatalogProvisioner, FoundationProvisioner, MessagingProvisioner,
};
use crate::test_support::FakeCloud;

const FAST: PollWindow = PollWindow {
    interval: Duration::from_millis(1),
    timeout: Duration::from_millis(20),
};

const SOURCE_BUCKET: &str = "caravan-source-123456789012-us-west-1";
const TARGET_BUCKET: &str = "caravan-target-123456789012-us-east-1";

fn utf8(tmp: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(tmp.path().join(name))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()))
}

fn sample_file(tmp: &TempDir) -> Utf8PathBuf {
    let path = utf8(tmp, "customers.csv");
    std::fs::write(&path, "id,name,country\n1,Ada,GB\n2,Lin,SG\n")
        .unwrap_or_else(|err| panic!("write sample: {err}"));
    path
}

async fn deployed_state(cloud: &FakeCloud, tmp: &TempDir) -> StateDocument {
    let mut state = StateDocument::seed("us-west-1", "us-east-1");
    FoundationProvisioner::new(cloud)
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("foundation: {err}"));
    MessagingProvisioner::new(cloud)
        .with_role_propagation_wait(Duration::ZERO)
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("messaging: {err}"));
    CatalogProvisioner::new(cloud)
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("catalog: {err}"));
    AnalyticsProvisioner::new(cloud, utf8(tmp, "query_templates"))
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("analytics: {err}"));
    state
}

fn exerciser<'a>(cloud: &'a FakeCloud, sample: Utf8PathBuf) -> Exerciser<'a, FakeCloud> {
    Exerciser::new(cloud, sample)
        .with_replication_poll(FAST)
        .with_crawler_poll(FAST)
        .with_query_poll(FAST)
}

fn seed_healthy_pipeline(cloud: &FakeCloud) {
    cloud.link_replication(SOURCE_BUCKET, TARGET_BUCKET);
    cloud.seed_tables(
        "caravan_catalog",
        vec![TableSummary {
            name: String::from("caravan_customers"),
            column_count: 3,
        }],
    );
    cloud.seed_query_rows(vec![
        vec![String::from("id"), String::from("country")],
        vec![String::from("1"), String::from("GB")],
        vec![String::from("2"), String::from("SG")],
    ]);
    cloud.seed_log_events(vec![LogEvent {
        timestamp_ms: 1_700_000_000_000,
        message: String::from("copied customers.csv"),
    }]);
}

#[rstest]
#[tokio::test]
async fn full_run_passes_every_step() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let state = deployed_state(&cloud, &tmp).await;
    seed_healthy_pipeline(&cloud);

    let outcome = exerciser(&cloud, sample_file(&tmp)).run(&state).await;

    assert!(outcome.passed(), "outcomes: {:?}", outcome.outcomes);
    assert_eq!(outcome.outcomes.len(), 6);
}

#[rstest]
#[tokio::test]
async fn missing_sample_file_fails_the_first_step() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let state = deployed_state(&cloud, &tmp).await;

    let outcome = exerciser(&cloud, utf8(&tmp, "absent.csv")).run(&state).await;

    assert!(!outcome.passed());
    assert_eq!(outcome.outcomes.len(), 1);
    let first = &outcome.outcomes[0];
    assert_eq!(first.step, ExerciseStep::Upload);
    assert!(matches!(
        first.result,
        Err(ExerciseError::SampleFile { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn replication_timeout_halts_the_sequence() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let state = deployed_state(&cloud, &tmp).await;
    // No replication link: the object never appears in the target bucket.

    let outcome = exerciser(&cloud, sample_file(&tmp)).run(&state).await;

    assert_eq!(outcome.outcomes.len(), 2);
    let second = &outcome.outcomes[1];
    assert_eq!(second.step, ExerciseStep::Replication);
    assert!(matches!(second.result, Err(ExerciseError::TimedOut { .. })));
}

#[rstest]
#[tokio::test]
async fn stuck_crawler_times_out() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let state = deployed_state(&cloud, &tmp).await;
    cloud.link_replication(SOURCE_BUCKET, TARGET_BUCKET);
    cloud.set_stuck_crawler(true);

    let outcome = exerciser(&cloud, sample_file(&tmp)).run(&state).await;

    assert_eq!(outcome.outcomes.len(), 3);
    let third = &outcome.outcomes[2];
    assert_eq!(third.step, ExerciseStep::Crawler);
    assert!(matches!(third.result, Err(ExerciseError::TimedOut { .. })));
}

#[rstest]
#[tokio::test]
async fn empty_catalog_fails_the_catalog_step() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let state = deployed_state(&cloud, &tmp).await;
    cloud.link_replication(SOURCE_BUCKET, TARGET_BUCKET);

    let outcome = exerciser(&cloud, sample_file(&tmp)).run(&state).await;

    assert_eq!(outcome.outcomes.len(), 4);
    let fourth = &outcome.outcomes[3];
    assert_eq!(fourth.step, ExerciseStep::Catalog);
    assert!(matches!(
        fourth.result,
        Err(ExerciseError::EmptyCatalog { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn failed_query_is_reported_with_its_reason() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let state = deployed_state(&cloud, &tmp).await;
    seed_healthy_pipeline(&cloud);
    cloud.fail_next_query("SYNTAX_ERROR at line 1");

    let outcome = exerciser(&cloud, sample_file(&tmp)).run(&state).await;

    assert_eq!(outcome.outcomes.len(), 5);
    let fifth = &outcome.outcomes[4];
    assert_eq!(fifth.step, ExerciseStep::Query);
    let Err(ExerciseError::QueryFailed { reason }) = &fifth.result else {
        panic!("expected query failure, got {:?}", fifth.result);
    };
    assert!(reason.contains("SYNTAX_ERROR"));
}

#[rstest]
fn render_table_aligns_columns() {
    let rows = vec![
        vec![String::from("country"), String::from("count")],
        vec![String::from("GB"), String::from("12")],
        vec![String::from("SG"), String::from("7")],
    ];

    let rendered = render_table(&rows);

    assert!(rendered.contains("│ country │ count │"));
    assert!(rendered.contains("│ GB      │ 12    │"));
    assert!(rendered.starts_with('┌'));
    assert!(rendered.ends_with('┘'));
}
