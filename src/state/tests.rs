//! Unit tests for the state document model.

use super::*;
use rstest::rstest;

#[rstest]
fn seed_document_starts_pending() {
    let doc = StateDocument::seed("us-west-1", "us-east-1");
    for (_, status) in doc.deployment_status.entries() {
        assert_eq!(status, GroupStatus::Pending);
    }
    assert!(doc.account_id.is_none());
    assert!(doc.resources.identity.role_arn.is_none());
}

#[rstest]
fn bucket_name_placeholders_are_rendered() {
    let spec = BucketSpec {
        name: String::from("caravan-source-{account-id}-{region}"),
        region: String::from("us-west-1"),
    };
    assert_eq!(
        spec.rendered_name("123456789012"),
        "caravan-source-123456789012-us-west-1"
    );
}

#[rstest]
fn bucket_name_without_placeholders_is_unchanged() {
    let spec = BucketSpec {
        name: String::from("fixed-bucket"),
        region: String::from("us-east-1"),
    };
    assert_eq!(spec.rendered_name("123456789012"), "fixed-bucket");
}

#[rstest]
fn status_table_get_set_round_trips() {
    let mut status = DeploymentStatus::default();
    status.set(StatusKey::Queue, GroupStatus::Completed);
    assert_eq!(status.get(StatusKey::Queue), GroupStatus::Completed);
    assert_eq!(status.get(StatusKey::Topic), GroupStatus::Pending);
}

#[rstest]
fn mark_all_overwrites_every_slot() {
    let mut status = DeploymentStatus::default();
    status.set(StatusKey::Identity, GroupStatus::Completed);
    status.mark_all(GroupStatus::Deleted);
    for (_, value) in status.entries() {
        assert_eq!(value, GroupStatus::Deleted);
    }
}

#[rstest]
fn document_round_trips_through_json() {
    let mut doc = StateDocument::seed("us-west-1", "us-east-1");
    doc.account_id = Some(String::from("123456789012"));
    doc.resources.identity.role_arn = Some(String::from("arn:aws:iam::123456789012:role/demo"));
    doc.deployment_status.set(StatusKey::Identity, GroupStatus::Completed);

    let rendered = serde_json::to_string_pretty(&doc).expect("document should serialise");
    let parsed: StateDocument = serde_json::from_str(&rendered).expect("document should parse");
    assert_eq!(parsed, doc);
}

#[rstest]
fn status_values_serialise_lowercase() {
    let rendered = serde_json::to_string(&GroupStatus::Completed).expect("status should serialise");
    assert_eq!(rendered, "\"completed\"");
}

#[rstest]
fn missing_status_table_defaults_to_pending() {
    let doc = StateDocument::seed("us-west-1", "us-east-1");
    let mut value = serde_json::to_value(&doc).expect("document should serialise");
    let map = value.as_object_mut().expect("document should be an object");
    map.remove("deployment_status");
    map.remove("last_run");

    let parsed: StateDocument =
        serde_json::from_value(value).expect("document without status should parse");
    assert_eq!(parsed.deployment_status, DeploymentStatus::default());
    assert!(parsed.last_run.is_none());
}
