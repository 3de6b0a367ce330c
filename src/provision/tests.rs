//! Unit tests for the group provisioners.

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::rstest;
use tempfile::TempDir;

use super::*;
use crate::provider::{ProviderError, QueryService};
use crate::state::{GroupStatus, StateDocument, StatusKey};
use crate::test_support::{FAKE_ACCOUNT_ID, FakeCloud};

fn seed() -> StateDocument {
    StateDocument::seed("us-west-1", "us-east-1")
}

fn templates_dir(tmp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(tmp.path().join("query_templates"))
        .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()))
}

async fn run_foundation(cloud: &FakeCloud, state: &mut StateDocument) {
    FoundationProvisioner::new(cloud)
        .run(state)
        .await
        .unwrap_or_else(|err| panic!("foundation should provision: {err}"));
}

async fn run_messaging(cloud: &FakeCloud, state: &mut StateDocument) {
    MessagingProvisioner::new(cloud)
        .with_role_propagation_wait(Duration::ZERO)
        .run(state)
        .await
        .unwrap_or_else(|err| panic!("messaging should provision: {err}"));
}

#[rstest]
#[tokio::test]
async fn foundation_provisions_role_and_buckets() {
    let cloud = FakeCloud::new();
    let mut state = seed();

    run_foundation(&cloud, &mut state).await;

    assert_eq!(state.account_id.as_deref(), Some(FAKE_ACCOUNT_ID));
    assert_eq!(
        state.deployment_status.get(StatusKey::Identity),
        GroupStatus::Completed
    );
    assert_eq!(
        state.deployment_status.get(StatusKey::Storage),
        GroupStatus::Completed
    );
    let role_arn = state.resources.identity.role_arn.as_deref();
    assert!(
        role_arn.is_some_and(|arn| arn.contains("caravan-pipeline-role")),
        "unexpected role ARN: {role_arn:?}"
    );
    let source = &state.resources.storage.source_bucket.name;
    assert_eq!(source, "caravan-source-123456789012-us-west-1");
    assert!(cloud.has_bucket(source));
    assert!(cloud.has_bucket("caravan-target-123456789012-us-east-1"));
    for bucket in [source.as_str(), "caravan-target-123456789012-us-east-1"] {
        assert!(cloud.bucket_is_versioned(bucket), "{bucket} not versioned");
        assert!(cloud.bucket_is_encrypted(bucket), "{bucket} not encrypted");
    }
    assert_eq!(cloud.bucket_region(source).as_deref(), Some("us-west-1"));
    assert_eq!(
        cloud
            .bucket_region("caravan-target-123456789012-us-east-1")
            .as_deref(),
        Some("us-east-1")
    );
}

#[rstest]
#[tokio::test]
async fn foundation_reruns_perform_no_creation_calls() {
    let cloud = FakeCloud::new();
    let mut state = seed();

    run_foundation(&cloud, &mut state).await;
    let calls_after_first = cloud.create_calls();
    run_foundation(&cloud, &mut state).await;

    assert_eq!(cloud.create_calls(), calls_after_first);
    assert_eq!(
        state.deployment_status.get(StatusKey::Storage),
        GroupStatus::Completed
    );
}

#[rstest]
#[tokio::test]
async fn foundation_marks_identity_failed_on_role_error() {
    let cloud = FakeCloud::new();
    cloud.inject_failure(
        "create_role",
        ProviderError::other("create_role", "access denied"),
    );
    let mut state = seed();

    let result = FoundationProvisioner::new(&cloud).run(&mut state).await;

    assert!(result.is_err());
    assert_eq!(
        state.deployment_status.get(StatusKey::Identity),
        GroupStatus::Failed
    );
    assert_eq!(
        state.deployment_status.get(StatusKey::Storage),
        GroupStatus::Pending
    );
}

#[rstest]
#[tokio::test]
async fn messaging_requires_foundation_identifiers() {
    let cloud = FakeCloud::new();
    let mut state = seed();

    let result = MessagingProvisioner::new(&cloud)
        .with_role_propagation_wait(Duration::ZERO)
        .run(&mut state)
        .await;

    assert!(matches!(
        result,
        Err(ProvisionError::MissingIdentifier { .. })
    ));
}

#[rstest]
#[tokio::test]
async fn messaging_provisions_topic_queue_and_function() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;

    run_messaging(&cloud, &mut state).await;

    for key in [StatusKey::Topic, StatusKey::Queue, StatusKey::Function] {
        assert_eq!(state.deployment_status.get(key), GroupStatus::Completed);
    }
    assert!(
        state
            .resources
            .topic
            .topic_name
            .starts_with("caravan-object-events-"),
        "topic name should carry a timestamp suffix: {}",
        state.resources.topic.topic_name
    );
    assert!(state.resources.queue.queue_url.is_some());
    assert!(state.resources.queue.subscribed_to_topic);
    assert_eq!(cloud.subscriptions().len(), 1);

    let topic_arn = state
        .resources
        .topic
        .topic_arn
        .clone()
        .unwrap_or_else(|| panic!("topic ARN should be recorded"));
    assert_eq!(
        cloud.topic_name(&topic_arn),
        Some(state.resources.topic.topic_name.clone())
    );
    let topic_policy = cloud
        .topic_policy(&topic_arn)
        .unwrap_or_else(|| panic!("topic policy should be applied"));
    assert!(topic_policy.contains("caravan-source-123456789012-us-west-1"));

    let queue_url = state
        .resources
        .queue
        .queue_url
        .clone()
        .unwrap_or_else(|| panic!("queue URL should be recorded"));
    let settings = cloud
        .queue_settings(&queue_url)
        .unwrap_or_else(|| panic!("queue should exist"));
    assert_eq!(settings.visibility_timeout_secs, 300);
    assert_eq!(settings.retention_secs, 1_209_600);
    assert_eq!(settings.receive_wait_secs, 20);
    let queue_policy = cloud
        .queue_policy(&queue_url)
        .unwrap_or_else(|| panic!("queue policy should be applied"));
    assert!(queue_policy.contains(&topic_arn));

    let environment = cloud
        .function_environment("caravan-copy-function")
        .unwrap_or_else(|| panic!("function should exist"));
    assert!(environment.iter().any(|(key, value)| {
        key == "TARGET_BUCKET" && value == "caravan-target-123456789012-us-east-1"
    }));
    assert!(
        cloud
            .function_package_size("caravan-copy-function")
            .is_some_and(|size| size > 0),
        "function package should not be empty"
    );
}

#[rstest]
#[tokio::test]
async fn messaging_reruns_perform_no_creation_calls() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;
    run_messaging(&cloud, &mut state).await;

    let calls_after_first = cloud.create_calls();
    let arn_after_first = state.resources.topic.topic_arn.clone();
    run_messaging(&cloud, &mut state).await;

    assert_eq!(cloud.create_calls(), calls_after_first);
    assert_eq!(state.resources.topic.topic_arn, arn_after_first);
}

#[rstest]
#[tokio::test]
async fn messaging_marks_queue_failed_and_keeps_topic() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;
    cloud.inject_failure(
        "create_queue",
        ProviderError::other("create_queue", "throttled"),
    );

    let result = MessagingProvisioner::new(&cloud)
        .with_role_propagation_wait(Duration::ZERO)
        .run(&mut state)
        .await;

    assert!(result.is_err());
    assert_eq!(
        state.deployment_status.get(StatusKey::Topic),
        GroupStatus::Completed
    );
    assert_eq!(
        state.deployment_status.get(StatusKey::Queue),
        GroupStatus::Failed
    );
    assert_eq!(
        state.deployment_status.get(StatusKey::Function),
        GroupStatus::Pending
    );
}

#[rstest]
#[tokio::test]
async fn catalog_provisions_database_classifier_and_crawler() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;

    CatalogProvisioner::new(&cloud)
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("catalog should provision: {err}"));

    assert_eq!(
        state.deployment_status.get(StatusKey::Catalog),
        GroupStatus::Completed
    );
    assert!(cloud.has_database("caravan_catalog"));
    assert!(cloud.has_crawler("caravan-target-crawler"));
    assert_eq!(
        state.resources.catalog.crawler_arn.as_deref(),
        Some("arn:aws:glue:us-east-1:123456789012:crawler/caravan-target-crawler")
    );
    assert_eq!(
        state.resources.catalog.target_path.as_deref(),
        Some("s3://caravan-target-123456789012-us-east-1/")
    );

    let spec = cloud
        .crawler_spec("caravan-target-crawler")
        .unwrap_or_else(|| panic!("crawler should exist"));
    assert_eq!(spec.database, "caravan_catalog");
    assert_eq!(spec.classifier, "caravan-csv-classifier");
    assert_eq!(spec.table_prefix, "caravan_");
    assert_eq!(spec.target_path, "s3://caravan-target-123456789012-us-east-1/");
    assert!(spec.role_arn.contains("caravan-pipeline-role"));
}

#[rstest]
#[tokio::test]
async fn catalog_reruns_perform_no_creation_calls() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;
    let provisioner = CatalogProvisioner::new(&cloud);
    provisioner
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("first catalog run: {err}"));

    let calls_after_first = cloud.create_calls();
    provisioner
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("second catalog run: {err}"));

    assert_eq!(cloud.create_calls(), calls_after_first);
}

#[rstest]
#[tokio::test]
async fn analytics_wires_notifications_and_query_service() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;
    run_messaging(&cloud, &mut state).await;
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let dir = templates_dir(&tmp);

    AnalyticsProvisioner::new(&cloud, dir.clone())
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("analytics should provision: {err}"));

    assert_eq!(
        state.deployment_status.get(StatusKey::Notifications),
        GroupStatus::Completed
    );
    assert_eq!(
        state.deployment_status.get(StatusKey::QueryService),
        GroupStatus::Completed
    );

    let topic_arn = state.resources.topic.topic_arn.clone();
    let notification = cloud.bucket_notification("caravan-source-123456789012-us-west-1");
    assert_eq!(
        notification,
        topic_arn.map(|arn| (arn, String::from(".csv")))
    );

    let results_bucket = "caravan-query-results-123456789012-us-east-1";
    assert!(cloud.has_bucket(results_bucket));
    assert_eq!(
        state.resources.query_service.query_result_location.as_deref(),
        Some("s3://caravan-query-results-123456789012-us-east-1/")
    );
    assert!(cloud.has_workgroup("caravan-queries"));

    for template in [
        "list_tables.sql",
        "describe_table.sql",
        "sample_query.sql",
        "count_records.sql",
    ] {
        assert!(
            dir.join(template).as_std_path().exists(),
            "missing template {template}"
        );
    }
}

#[rstest]
#[tokio::test]
async fn analytics_reconciles_existing_workgroup_output() {
    let cloud = FakeCloud::new();
    let mut state = seed();
    run_foundation(&cloud, &mut state).await;
    run_messaging(&cloud, &mut state).await;
    cloud
        .create_workgroup("us-east-1", "caravan-queries", "s3://somewhere-else/")
        .await
        .unwrap_or_else(|err| panic!("seed workgroup: {err}"));
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));

    AnalyticsProvisioner::new(&cloud, templates_dir(&tmp))
        .run(&mut state)
        .await
        .unwrap_or_else(|err| panic!("analytics should provision: {err}"));

    assert_eq!(
        cloud.workgroup_output("caravan-queries").as_deref(),
        Some("s3://caravan-query-results-123456789012-us-east-1/")
    );
}

#[rstest]
fn policy_documents_reference_their_resources() {
    let topic = topic_publish_policy("arn:topic", "123456789012", "bucket-a");
    assert!(topic.contains("arn:topic"));
    assert!(topic.contains("arn:aws:s3:::bucket-a"));
    assert!(topic.contains("123456789012"));

    let queue = queue_send_policy("arn:queue", "arn:topic");
    assert!(queue.contains("arn:queue"));
    assert!(queue.contains("arn:topic"));

    assert!(role_trust_policy().contains("sts:AssumeRole"));
    assert_eq!(
        managed_policy_arn("AmazonS3FullAccess"),
        "arn:aws:iam::aws:policy/AmazonS3FullAccess"
    );
}
