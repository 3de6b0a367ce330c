//! Idempotent provisioners for the pipeline's resource groups.
//!
//! Every provisioner follows the same contract: look each resource up by
//! the name (or identifier) recorded in the state document, create it with
//! its fixed configuration only when the lookup says it is absent, and
//! write resulting identifiers and status keys back into the document.
//! Partial failures leave already-recorded identifiers in place and mark
//! the owning status key `failed`; re-running short-circuits over the
//! parts that already exist.

mod analytics;
mod catalog;
mod foundation;
mod messaging;

#[cfg(test)]
mod tests;

use chrono::Utc;
use thiserror::Error;

use crate::payload::PayloadError;
use crate::provider::ProviderError;

pub use analytics::AnalyticsProvisioner;
pub use catalog::CatalogProvisioner;
pub use foundation::FoundationProvisioner;
pub use messaging::MessagingProvisioner;

/// Errors raised while provisioning a resource group.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A provider call failed with something other than the expected
    /// already-exists/not-found conditions.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The state document lacks an identifier an earlier group records.
    #[error("state document missing {what}; run the earlier groups first")]
    MissingIdentifier {
        /// Description of the missing identifier.
        what: &'static str,
    },
    /// The function deployment package could not be assembled.
    #[error(transparent)]
    Package(#[from] PayloadError),
}

/// Suffix appended to topic and queue names at creation time so fresh
/// names dodge provider-side name-reuse cooldowns.
pub(crate) fn timestamp_suffix() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Expands a managed policy name into its ARN.
pub(crate) fn managed_policy_arn(name: &str) -> String {
    format!("arn:aws:iam::aws:policy/{name}")
}

/// Trust policy allowing the function and crawler services to assume the
/// pipeline role.
pub(crate) fn role_trust_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {
                "Service": ["lambda.amazonaws.com", "glue.amazonaws.com"],
            },
            "Action": "sts:AssumeRole",
        }],
    })
    .to_string()
}

/// Topic policy allowing the source bucket to publish object events.
pub(crate) fn topic_publish_policy(topic_arn: &str, account_id: &str, bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Id": "allow-bucket-publish",
        "Statement": [{
            "Sid": "AllowBucketPublish",
            "Effect": "Allow",
            "Principal": { "Service": "s3.amazonaws.com" },
            "Action": "SNS:Publish",
            "Resource": topic_arn,
            "Condition": {
                "StringEquals": { "aws:SourceAccount": account_id },
                "ArnEquals": { "aws:SourceArn": format!("arn:aws:s3:::{bucket}") },
            },
        }],
    })
    .to_string()
}

/// Queue policy allowing the topic to deliver messages.
pub(crate) fn queue_send_policy(queue_arn: &str, topic_arn: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "sns.amazonaws.com" },
            "Action": "sqs:SendMessage",
            "Resource": queue_arn,
            "Condition": {
                "StringEquals": { "aws:SourceArn": topic_arn },
            },
        }],
    })
    .to_string()
}
