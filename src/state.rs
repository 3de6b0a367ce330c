//! Typed model of the pipeline's shared state document.
//!
//! The document is a single JSON file recording the two pipeline regions,
//! the identifiers of every provisioned resource, and a per-group
//! deployment status table. It is read wholesale, mutated in memory, and
//! written back wholesale by every operation; the provider remains the
//! source of truth for what actually exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder in seeded bucket names replaced by the account id.
pub const ACCOUNT_PLACEHOLDER: &str = "{account-id}";
/// Placeholder in seeded bucket names replaced by the bucket's region.
pub const REGION_PLACEHOLDER: &str = "{region}";

/// Source and target regions the pipeline spans.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Regions {
    /// Region holding the source bucket, topic, and notification.
    pub source_region: String,
    /// Region holding the target bucket, queue, function, catalog, and
    /// query workgroup.
    pub target_region: String,
}

/// Identity resources: the service role assumed by the copy function and
/// the catalog crawler.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IdentityResources {
    /// Name of the service role.
    pub role_name: String,
    /// Managed policy names attached to the role.
    #[serde(default)]
    pub policies_attached: Vec<String>,
    /// ARN recorded once the role exists.
    #[serde(default)]
    pub role_arn: Option<String>,
}

/// One bucket: its (possibly templated) name and home region.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BucketSpec {
    /// Bucket name, optionally containing [`ACCOUNT_PLACEHOLDER`] and
    /// [`REGION_PLACEHOLDER`].
    pub name: String,
    /// Region the bucket lives in.
    pub region: String,
}

impl BucketSpec {
    /// Returns the concrete bucket name with placeholders resolved.
    #[must_use]
    pub fn rendered_name(&self, account_id: &str) -> String {
        self.name
            .replace(ACCOUNT_PLACEHOLDER, account_id)
            .replace(REGION_PLACEHOLDER, &self.region)
    }
}

/// Storage resources: the source and target buckets.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StorageResources {
    /// Bucket files are uploaded into.
    pub source_bucket: BucketSpec,
    /// Bucket files are copied to in the target region.
    pub target_bucket: BucketSpec,
}

/// Notification topic resources.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TopicResources {
    /// Topic name. Seeded as a base name; the provisioner writes back the
    /// timestamp-suffixed name it actually created.
    pub topic_name: String,
    /// ARN recorded once the topic exists.
    #[serde(default)]
    pub topic_arn: Option<String>,
}

/// Queue resources.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueueResources {
    /// Queue name. Seeded as a base name; the provisioner writes back the
    /// timestamp-suffixed name it actually created.
    pub queue_name: String,
    /// Queue URL recorded once the queue exists.
    #[serde(default)]
    pub queue_url: Option<String>,
    /// Queue ARN recorded once the queue exists.
    #[serde(default)]
    pub queue_arn: Option<String>,
    /// Whether the topic→queue subscription has been established.
    #[serde(default)]
    pub subscribed_to_topic: bool,
}

/// Copy function resources.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FunctionResources {
    /// Function name.
    pub function_name: String,
    /// ARN recorded once the function exists.
    #[serde(default)]
    pub function_arn: Option<String>,
}

/// Data catalog resources.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CatalogResources {
    /// Catalog database name.
    pub database_name: String,
    /// CSV classifier name.
    pub classifier_name: String,
    /// Crawler name.
    pub crawler_name: String,
    /// Prefix applied to tables the crawler creates.
    pub table_prefix: String,
    /// Crawler ARN recorded once the crawler exists.
    #[serde(default)]
    pub crawler_arn: Option<String>,
    /// Storage path the crawler scans (`s3://<target-bucket>/`).
    #[serde(default)]
    pub target_path: Option<String>,
}

/// Query service resources.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct QueryServiceResources {
    /// Workgroup queries run under.
    pub workgroup: String,
    /// Bucket holding query results, recorded once ensured.
    #[serde(default)]
    pub results_bucket: Option<String>,
    /// Result output location (`s3://<results-bucket>/`).
    #[serde(default)]
    pub query_result_location: Option<String>,
}

/// Closed record of every resource group the pipeline owns.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Resources {
    /// Service role.
    pub identity: IdentityResources,
    /// Source and target buckets.
    pub storage: StorageResources,
    /// Notification topic.
    pub topic: TopicResources,
    /// Delivery queue.
    pub queue: QueueResources,
    /// Copy function.
    pub function: FunctionResources,
    /// Catalog database, classifier, and crawler.
    pub catalog: CatalogResources,
    /// Query workgroup and results location.
    pub query_service: QueryServiceResources,
}

/// Lifecycle status of one deployment status slot.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    /// Not yet provisioned.
    #[default]
    Pending,
    /// Provisioned with all identifiers recorded.
    Completed,
    /// Provisioning was attempted and failed.
    Failed,
    /// Decommissioned.
    Deleted,
}

impl GroupStatus {
    /// Lower-case label used in console output and the JSON document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Closed set of status slots tracked by the document.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusKey {
    /// Service role.
    Identity,
    /// Source and target buckets.
    Storage,
    /// Notification topic.
    Topic,
    /// Delivery queue.
    Queue,
    /// Copy function.
    Function,
    /// Catalog database, classifier, and crawler.
    Catalog,
    /// Source-bucket event notification wiring.
    Notifications,
    /// Query workgroup and results location.
    QueryService,
}

impl StatusKey {
    /// Every status slot, in document order.
    pub const ALL: [Self; 8] = [
        Self::Identity,
        Self::Storage,
        Self::Topic,
        Self::Queue,
        Self::Function,
        Self::Catalog,
        Self::Notifications,
        Self::QueryService,
    ];

    /// Human-readable description used in the status table.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Identity => "Service role",
            Self::Storage => "Source and target buckets",
            Self::Topic => "Notification topic",
            Self::Queue => "Delivery queue",
            Self::Function => "Copy function",
            Self::Catalog => "Catalog database and crawler",
            Self::Notifications => "Bucket event notifications",
            Self::QueryService => "Query workgroup",
        }
    }
}

/// Deployment status table: one [`GroupStatus`] per [`StatusKey`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeploymentStatus {
    /// Status of the service role.
    #[serde(default)]
    pub identity: GroupStatus,
    /// Status of the buckets.
    #[serde(default)]
    pub storage: GroupStatus,
    /// Status of the notification topic.
    #[serde(default)]
    pub topic: GroupStatus,
    /// Status of the delivery queue.
    #[serde(default)]
    pub queue: GroupStatus,
    /// Status of the copy function.
    #[serde(default)]
    pub function: GroupStatus,
    /// Status of the catalog resources.
    #[serde(default)]
    pub catalog: GroupStatus,
    /// Status of the bucket notification wiring.
    #[serde(default)]
    pub notifications: GroupStatus,
    /// Status of the query workgroup.
    #[serde(default)]
    pub query_service: GroupStatus,
}

impl DeploymentStatus {
    /// Reads the status for a slot.
    #[must_use]
    pub const fn get(&self, key: StatusKey) -> GroupStatus {
        match key {
            StatusKey::Identity => self.identity,
            StatusKey::Storage => self.storage,
            StatusKey::Topic => self.topic,
            StatusKey::Queue => self.queue,
            StatusKey::Function => self.function,
            StatusKey::Catalog => self.catalog,
            StatusKey::Notifications => self.notifications,
            StatusKey::QueryService => self.query_service,
        }
    }

    /// Writes the status for a slot.
    pub const fn set(&mut self, key: StatusKey, status: GroupStatus) {
        match key {
            StatusKey::Identity => self.identity = status,
            StatusKey::Storage => self.storage = status,
            StatusKey::Topic => self.topic = status,
            StatusKey::Queue => self.queue = status,
            StatusKey::Function => self.function = status,
            StatusKey::Catalog => self.catalog = status,
            StatusKey::Notifications => self.notifications = status,
            StatusKey::QueryService => self.query_service = status,
        }
    }

    /// Sets every slot to `status`.
    pub fn mark_all(&mut self, status: GroupStatus) {
        for key in StatusKey::ALL {
            self.set(key, status);
        }
    }

    /// Snapshot of every slot in document order.
    #[must_use]
    pub fn entries(&self) -> Vec<(StatusKey, GroupStatus)> {
        StatusKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .collect()
    }
}

/// The whole state document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StateDocument {
    /// Pipeline regions.
    pub regions: Regions,
    /// Provisioned resource records.
    pub resources: Resources,
    /// Deployment status table.
    #[serde(default)]
    pub deployment_status: DeploymentStatus,
    /// Account identifier, recorded by the first provisioner run.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Timestamp of the most recent run that touched the document.
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Timestamp of decommissioning, if it has happened.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl StateDocument {
    /// Builds a fresh pending document for the given regions with the
    /// default resource names.
    #[must_use]
    pub fn seed(source_region: impl Into<String>, target_region: impl Into<String>) -> Self {
        let source_region = source_region.into();
        let target_region = target_region.into();
        Self {
            resources: Resources {
                identity: IdentityResources {
                    role_name: String::from("caravan-pipeline-role"),
                    policies_attached: vec![
                        String::from("AmazonS3FullAccess"),
                        String::from("AmazonSQSFullAccess"),
                        String::from("AWSGlueServiceRole"),
                        String::from("CloudWatchLogsFullAccess"),
                    ],
                    role_arn: None,
                },
                storage: StorageResources {
                    source_bucket: BucketSpec {
                        name: format!("caravan-source-{ACCOUNT_PLACEHOLDER}-{REGION_PLACEHOLDER}"),
                        region: source_region.clone(),
                    },
                    target_bucket: BucketSpec {
                        name: format!("caravan-target-{ACCOUNT_PLACEHOLDER}-{REGION_PLACEHOLDER}"),
                        region: target_region.clone(),
                    },
                },
                topic: TopicResources {
                    topic_name: String::from("caravan-object-events"),
                    topic_arn: None,
                },
                queue: QueueResources {
                    queue_name: String::from("caravan-copy-queue"),
                    queue_url: None,
                    queue_arn: None,
                    subscribed_to_topic: false,
                },
                function: FunctionResources {
                    function_name: String::from("caravan-copy-function"),
                    function_arn: None,
                },
                catalog: CatalogResources {
                    database_name: String::from("caravan_catalog"),
                    classifier_name: String::from("caravan-csv-classifier"),
                    crawler_name: String::from("caravan-target-crawler"),
                    table_prefix: String::from("caravan_"),
                    crawler_arn: None,
                    target_path: None,
                },
                query_service: QueryServiceResources {
                    workgroup: String::from("caravan-queries"),
                    results_bucket: None,
                    query_result_location: None,
                },
            },
            regions: Regions {
                source_region,
                target_region,
            },
            deployment_status: DeploymentStatus::default(),
            account_id: None,
            last_run: None,
            deletion_timestamp: None,
        }
    }

    /// Updates the last-run timestamp to now.
    pub fn touch(&mut self) {
        self.last_run = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests;
