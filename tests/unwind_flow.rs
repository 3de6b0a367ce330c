//! Decommissioning flows against the in-memory provider.

use std::time::Duration;

use camino::Utf8PathBuf;
use caravan::deploy::Deployer;
use caravan::poll::PollWindow;
use caravan::provider::{CatalogService, ObjectVersion, ProviderError};
use caravan::state::{GroupStatus, StateDocument, StatusKey};
use caravan::store::StateStore;
use caravan::test_support::FakeCloud;
use caravan::unwind::Unwinder;
use rstest::rstest;
use tempfile::TempDir;

const SOURCE_BUCKET: &str = "caravan-source-123456789012-us-west-1";
const FAST: PollWindow = PollWindow {
    interval: Duration::from_millis(1),
    timeout: Duration::from_millis(20),
};

fn utf8(tmp: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(tmp.path().join(name))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()))
}

fn seeded_store(tmp: &TempDir) -> StateStore {
    let store = StateStore::new(utf8(tmp, "run_data.json"));
    store
        .save(&StateDocument::seed("us-west-1", "us-east-1"))
        .unwrap_or_else(|err| panic!("seed state: {err}"));
    store
}

async fn deploy(cloud: &FakeCloud, store: &StateStore, tmp: &TempDir) {
    Deployer::new(cloud, store, utf8(tmp, "query_templates"))
        .with_role_propagation_wait(Duration::ZERO)
        .deploy()
        .await
        .unwrap_or_else(|err| panic!("deploy: {err}"));
}

fn unwinder<'a>(
    cloud: &'a FakeCloud,
    store: &'a StateStore,
    tmp: &TempDir,
) -> Unwinder<'a, FakeCloud> {
    Unwinder::new(cloud, store, utf8(tmp, "query_templates")).with_crawler_stop(FAST)
}

#[rstest]
#[tokio::test]
async fn unwind_deletes_every_deployed_resource() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let store = seeded_store(&tmp);
    deploy(&cloud, &store, &tmp).await;

    let summary = unwinder(&cloud, &store, &tmp)
        .unwind()
        .await
        .unwrap_or_else(|err| panic!("unwind: {err}"));

    assert!(summary.is_clean(), "failures: {:?}", summary.failures);
    assert!(!cloud.has_bucket(SOURCE_BUCKET));
    assert!(!cloud.has_bucket("caravan-target-123456789012-us-east-1"));
    assert!(!cloud.has_bucket("caravan-query-results-123456789012-us-east-1"));
    assert!(!cloud.has_role("caravan-pipeline-role"));
    assert!(!cloud.has_function("caravan-copy-function"));
    assert!(!cloud.has_database("caravan_catalog"));
    assert!(!cloud.has_crawler("caravan-target-crawler"));
    assert!(!cloud.has_workgroup("caravan-queries"));
    assert!(cloud.topic_arns().is_empty());
    assert!(cloud.queue_urls().is_empty());
    assert!(
        !utf8(&tmp, "query_templates").as_std_path().exists(),
        "query templates should be removed"
    );

    let state = store.load().unwrap_or_else(|err| panic!("load: {err}"));
    for key in StatusKey::ALL {
        assert_eq!(state.deployment_status.get(key), GroupStatus::Deleted);
    }
    assert!(state.deletion_timestamp.is_some());
}

#[rstest]
#[tokio::test]
async fn unwind_tolerates_resources_that_never_existed() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let store = seeded_store(&tmp);

    let summary = unwinder(&cloud, &store, &tmp)
        .unwind()
        .await
        .unwrap_or_else(|err| panic!("unwind: {err}"));

    assert!(summary.is_clean(), "failures: {:?}", summary.failures);
    assert!(summary.deleted.is_empty());
    assert!(!summary.skipped.is_empty());

    let state = store.load().unwrap_or_else(|err| panic!("load: {err}"));
    for key in StatusKey::ALL {
        assert_eq!(state.deployment_status.get(key), GroupStatus::Deleted);
    }
}

#[rstest]
#[tokio::test]
async fn versioned_purge_covers_every_entry_before_bucket_deletion() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let store = seeded_store(&tmp);
    deploy(&cloud, &store, &tmp).await;

    // 1500 object versions plus 300 delete markers in the source bucket.
    let mut versions: Vec<ObjectVersion> = (0..1500)
        .map(|index| ObjectVersion {
            key: format!("customers-{index}.csv"),
            version_id: format!("v{index}"),
        })
        .collect();
    versions.extend((0..300).map(|index| ObjectVersion {
        key: format!("customers-{index}.csv"),
        version_id: format!("marker{index}"),
    }));
    cloud.seed_object_versions(SOURCE_BUCKET, versions);

    let summary = unwinder(&cloud, &store, &tmp)
        .unwind()
        .await
        .unwrap_or_else(|err| panic!("unwind: {err}"));

    assert!(summary.is_clean(), "failures: {:?}", summary.failures);
    assert_eq!(cloud.deletion_batches(SOURCE_BUCKET), vec![1000, 800]);
    assert_eq!(cloud.remaining_versions(SOURCE_BUCKET), 0);
    assert!(!cloud.has_bucket(SOURCE_BUCKET));
}

#[rstest]
#[tokio::test]
async fn running_crawler_is_stopped_before_deletion() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let store = seeded_store(&tmp);
    deploy(&cloud, &store, &tmp).await;

    cloud.set_stuck_crawler(true);
    cloud
        .start_crawler("us-east-1", "caravan-target-crawler")
        .await
        .unwrap_or_else(|err| panic!("start crawler: {err}"));

    let summary = unwinder(&cloud, &store, &tmp)
        .unwind()
        .await
        .unwrap_or_else(|err| panic!("unwind: {err}"));

    assert!(summary.is_clean(), "failures: {:?}", summary.failures);
    assert!(!cloud.has_crawler("caravan-target-crawler"));
}

#[rstest]
#[tokio::test]
async fn a_failing_step_does_not_halt_the_sweep() {
    let cloud = FakeCloud::new();
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let store = seeded_store(&tmp);
    deploy(&cloud, &store, &tmp).await;
    cloud.inject_failure(
        "delete_function",
        ProviderError::other("delete_function", "access denied"),
    );

    let summary = unwinder(&cloud, &store, &tmp)
        .unwind()
        .await
        .unwrap_or_else(|err| panic!("unwind: {err}"));

    assert_eq!(summary.failures.len(), 1);
    let (what, message) = &summary.failures[0];
    assert!(what.contains("function"), "failed step: {what}");
    assert!(message.contains("access denied"));
    // Everything after the failing step was still attempted.
    assert!(!cloud.has_database("caravan_catalog"));
    assert!(!cloud.has_role("caravan-pipeline-role"));
    assert!(cloud.queue_urls().is_empty());

    let state = store.load().unwrap_or_else(|err| panic!("load: {err}"));
    for key in StatusKey::ALL {
        assert_eq!(state.deployment_status.get(key), GroupStatus::Deleted);
    }
}
