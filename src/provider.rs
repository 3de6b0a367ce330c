//! Provider boundary for the managed services the pipeline touches.
//!
//! Each trait covers one service family (object storage, identity,
//! messaging and compute, data catalog, query execution, log retrieval).
//! The pipeline code only speaks these traits; the [`crate::aws`] module
//! implements them over the provider SDK and
//! [`crate::test_support::FakeCloud`] implements them in memory for tests.
//!
//! Errors carry a coarse [`ErrorKind`] so callers can branch on the two
//! conditions idempotent provisioning cares about: "already exists" (treat
//! as success) and "not found" (expected precondition to creation, or a
//! tolerable outcome during decommissioning).

use async_trait::async_trait;
use thiserror::Error;

/// Coarse classification of a provider failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The resource already exists (or the call conflicts with an existing
    /// resource).
    AlreadyExists,
    /// The resource does not exist.
    NotFound,
    /// Any other provider failure.
    Other,
}

/// A classified provider failure.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{operation} failed: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    operation: &'static str,
    message: String,
}

impl ProviderError {
    /// Builds an error with an explicit kind.
    #[must_use]
    pub fn new(kind: ErrorKind, operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation,
            message: message.into(),
        }
    }

    /// Builds an `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, operation, message)
    }

    /// Builds a `NotFound` error.
    #[must_use]
    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, operation, message)
    }

    /// Builds an unclassified error.
    #[must_use]
    pub fn other(operation: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, operation, message)
    }

    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the provider operation that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// True when the failure means the resource already exists.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self.kind, ErrorKind::AlreadyExists)
    }

    /// True when the failure means the resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }
}

/// One object version or delete marker in a versioned bucket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectVersion {
    /// Object key.
    pub key: String,
    /// Version identifier (also set for delete markers).
    pub version_id: String,
}

/// Delivery settings applied when creating the queue.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueueSettings {
    /// Seconds a received message stays invisible to other consumers.
    pub visibility_timeout_secs: u32,
    /// Seconds an unconsumed message is retained.
    pub retention_secs: u32,
    /// Long-poll wait applied to receive calls, in seconds.
    pub receive_wait_secs: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: 300,
            retention_secs: 1_209_600,
            receive_wait_secs: 20,
        }
    }
}

/// Parameters for creating the copy function.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FunctionSpec {
    /// Function name.
    pub name: String,
    /// Execution role ARN.
    pub role_arn: String,
    /// Runtime identifier (for example `python3.12`).
    pub runtime: String,
    /// Handler entry point.
    pub handler: String,
    /// Human-readable description.
    pub description: String,
    /// Execution timeout in seconds.
    pub timeout_secs: i32,
    /// Memory allocation in megabytes.
    pub memory_mb: i32,
    /// Environment variables passed to the function.
    pub environment: Vec<(String, String)>,
    /// Zipped deployment package.
    pub package: Vec<u8>,
}

/// Parameters for creating the catalog crawler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CrawlerSpec {
    /// Crawler name.
    pub name: String,
    /// Role ARN the crawler assumes.
    pub role_arn: String,
    /// Catalog database tables are written into.
    pub database: String,
    /// Classifier applied during crawls.
    pub classifier: String,
    /// Prefix applied to created tables.
    pub table_prefix: String,
    /// Storage path the crawler scans.
    pub target_path: String,
    /// Human-readable description.
    pub description: String,
}

/// State of a catalog crawler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CrawlerState {
    /// Idle and ready to run (a finished crawl reports this state).
    Ready,
    /// Currently crawling.
    Running,
    /// Stopping after a stop request.
    Stopping,
    /// Any other provider-reported state.
    Other(String),
}

/// Summary of one catalog table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableSummary {
    /// Table name.
    pub name: String,
    /// Number of columns in the table schema.
    pub column_count: usize,
}

/// Configuration of an existing query workgroup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkgroupInfo {
    /// Configured result output location, if any.
    pub output_location: Option<String>,
}

/// State of a query execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QueryState {
    /// Waiting to run.
    Queued,
    /// Running.
    Running,
    /// Finished successfully; results are available.
    Succeeded,
    /// Failed with the given reason.
    Failed {
        /// Provider-reported failure reason.
        reason: String,
    },
    /// Cancelled before completion.
    Cancelled,
}

/// One retrieved log event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEvent {
    /// Event timestamp in milliseconds since the epoch.
    pub timestamp_ms: i64,
    /// Raw log line.
    pub message: String,
}

/// Identity operations: caller account and the pipeline service role.
#[async_trait]
pub trait IdentityService {
    /// Returns the account identifier of the ambient credentials.
    async fn account_id(&self) -> Result<String, ProviderError>;

    /// Looks up the role's ARN, returning `None` when the role is absent.
    async fn role_arn(&self, role_name: &str) -> Result<Option<String>, ProviderError>;

    /// Creates the role with the given trust policy and returns its ARN.
    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        description: &str,
    ) -> Result<String, ProviderError>;

    /// Attaches a managed policy to the role.
    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError>;

    /// Lists the ARNs of managed policies attached to the role.
    async fn attached_policy_arns(&self, role_name: &str) -> Result<Vec<String>, ProviderError>;

    /// Detaches a managed policy from the role.
    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError>;

    /// Deletes the role.
    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError>;
}

/// Object storage operations.
#[async_trait]
pub trait ObjectStore {
    /// True when the bucket exists and is accessible.
    async fn bucket_exists(&self, region: &str, bucket: &str) -> Result<bool, ProviderError>;

    /// Creates the bucket in the given region.
    async fn create_bucket(&self, region: &str, bucket: &str) -> Result<(), ProviderError>;

    /// Enables object versioning on the bucket.
    async fn enable_versioning(&self, region: &str, bucket: &str) -> Result<(), ProviderError>;

    /// Applies AES-256 default encryption to the bucket.
    async fn apply_default_encryption(
        &self,
        region: &str,
        bucket: &str,
    ) -> Result<(), ProviderError>;

    /// Uploads an object.
    async fn put_object(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), ProviderError>;

    /// True when the object exists in the bucket.
    async fn object_exists(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> Result<bool, ProviderError>;

    /// Points the bucket's object-created events (filtered to keys ending
    /// in `suffix`) at the topic.
    async fn configure_topic_notification(
        &self,
        region: &str,
        bucket: &str,
        topic_arn: &str,
        suffix: &str,
    ) -> Result<(), ProviderError>;

    /// Lists every object version and delete marker in the bucket.
    async fn list_object_versions(
        &self,
        region: &str,
        bucket: &str,
    ) -> Result<Vec<ObjectVersion>, ProviderError>;

    /// Deletes one batch of object versions and delete markers.
    async fn delete_object_versions(
        &self,
        region: &str,
        bucket: &str,
        versions: &[ObjectVersion],
    ) -> Result<(), ProviderError>;

    /// Deletes the (empty) bucket.
    async fn delete_bucket(&self, region: &str, bucket: &str) -> Result<(), ProviderError>;
}

/// Notification topic, delivery queue, and copy function operations.
#[async_trait]
pub trait MessagingService {
    /// True when the topic identified by `topic_arn` still exists.
    async fn topic_exists(&self, region: &str, topic_arn: &str) -> Result<bool, ProviderError>;

    /// Creates the topic and returns its ARN.
    async fn create_topic(&self, region: &str, name: &str) -> Result<String, ProviderError>;

    /// Replaces the topic's access policy.
    async fn set_topic_policy(
        &self,
        region: &str,
        topic_arn: &str,
        policy: &str,
    ) -> Result<(), ProviderError>;

    /// Deletes the topic.
    async fn delete_topic(&self, region: &str, topic_arn: &str) -> Result<(), ProviderError>;

    /// True when the queue identified by `queue_url` still exists.
    async fn queue_exists(&self, region: &str, queue_url: &str) -> Result<bool, ProviderError>;

    /// Creates the queue and returns its URL.
    async fn create_queue(
        &self,
        region: &str,
        name: &str,
        settings: &QueueSettings,
    ) -> Result<String, ProviderError>;

    /// Resolves the queue's ARN from its URL.
    async fn queue_arn(&self, region: &str, queue_url: &str) -> Result<String, ProviderError>;

    /// Replaces the queue's access policy.
    async fn set_queue_policy(
        &self,
        region: &str,
        queue_url: &str,
        policy: &str,
    ) -> Result<(), ProviderError>;

    /// Subscribes the queue to the topic and returns the subscription ARN.
    async fn subscribe_queue(
        &self,
        region: &str,
        topic_arn: &str,
        queue_arn: &str,
    ) -> Result<String, ProviderError>;

    /// Deletes the queue.
    async fn delete_queue(&self, region: &str, queue_url: &str) -> Result<(), ProviderError>;

    /// Looks up the function's ARN, returning `None` when absent.
    async fn function_arn(&self, region: &str, name: &str)
    -> Result<Option<String>, ProviderError>;

    /// Creates the function and returns its ARN.
    async fn create_function(
        &self,
        region: &str,
        spec: &FunctionSpec,
    ) -> Result<String, ProviderError>;

    /// Finds an existing queue→function event-source mapping, returning its
    /// identifier when present.
    async fn event_source_mapping_for(
        &self,
        region: &str,
        function_name: &str,
        queue_arn: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Creates a queue→function event-source mapping and returns its
    /// identifier.
    async fn create_event_source_mapping(
        &self,
        region: &str,
        function_name: &str,
        queue_arn: &str,
        batch_size: i32,
        batching_window_secs: i32,
    ) -> Result<String, ProviderError>;

    /// Deletes the function.
    async fn delete_function(&self, region: &str, name: &str) -> Result<(), ProviderError>;
}

/// Data catalog operations.
#[async_trait]
pub trait CatalogService {
    /// True when the catalog database exists.
    async fn database_exists(&self, region: &str, name: &str) -> Result<bool, ProviderError>;

    /// Creates the catalog database.
    async fn create_database(
        &self,
        region: &str,
        name: &str,
        description: &str,
    ) -> Result<(), ProviderError>;

    /// True when the classifier exists.
    async fn classifier_exists(&self, region: &str, name: &str) -> Result<bool, ProviderError>;

    /// Creates a CSV classifier (comma delimiter, double-quote, header
    /// present).
    async fn create_csv_classifier(&self, region: &str, name: &str) -> Result<(), ProviderError>;

    /// True when the crawler exists.
    async fn crawler_exists(&self, region: &str, name: &str) -> Result<bool, ProviderError>;

    /// Creates the crawler.
    async fn create_crawler(&self, region: &str, spec: &CrawlerSpec) -> Result<(), ProviderError>;

    /// Starts a crawl.
    async fn start_crawler(&self, region: &str, name: &str) -> Result<(), ProviderError>;

    /// Reports the crawler's current state.
    async fn crawler_state(&self, region: &str, name: &str) -> Result<CrawlerState, ProviderError>;

    /// Requests the crawler to stop.
    async fn stop_crawler(&self, region: &str, name: &str) -> Result<(), ProviderError>;

    /// Lists tables in the catalog database.
    async fn list_tables(
        &self,
        region: &str,
        database: &str,
    ) -> Result<Vec<TableSummary>, ProviderError>;

    /// Deletes the crawler.
    async fn delete_crawler(&self, region: &str, name: &str) -> Result<(), ProviderError>;

    /// Deletes the classifier.
    async fn delete_classifier(&self, region: &str, name: &str) -> Result<(), ProviderError>;

    /// Deletes the catalog database (and its tables).
    async fn delete_database(&self, region: &str, name: &str) -> Result<(), ProviderError>;
}

/// Managed query execution operations.
#[async_trait]
pub trait QueryService {
    /// Looks up the workgroup, returning `None` when absent.
    async fn lookup_workgroup(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<WorkgroupInfo>, ProviderError>;

    /// Creates the workgroup with the given result output location.
    async fn create_workgroup(
        &self,
        region: &str,
        name: &str,
        output_location: &str,
    ) -> Result<(), ProviderError>;

    /// Updates an existing workgroup's result output location.
    async fn update_workgroup_output(
        &self,
        region: &str,
        name: &str,
        output_location: &str,
    ) -> Result<(), ProviderError>;

    /// Submits a query and returns its execution identifier.
    async fn start_query(
        &self,
        region: &str,
        workgroup: &str,
        sql: &str,
    ) -> Result<String, ProviderError>;

    /// Reports the state of a query execution.
    async fn query_state(
        &self,
        region: &str,
        execution_id: &str,
    ) -> Result<QueryState, ProviderError>;

    /// Fetches result rows (first row is the header) of a succeeded query.
    async fn query_rows(
        &self,
        region: &str,
        execution_id: &str,
    ) -> Result<Vec<Vec<String>>, ProviderError>;

    /// Deletes the workgroup.
    async fn delete_workgroup(&self, region: &str, name: &str) -> Result<(), ProviderError>;
}

/// Execution log retrieval.
#[async_trait]
pub trait LogService {
    /// Fetches the most recent log events of the function's newest stream.
    async fn recent_function_logs(
        &self,
        region: &str,
        function_name: &str,
        limit: i32,
    ) -> Result<Vec<LogEvent>, ProviderError>;
}

/// Everything the pipeline needs from the provider, in one bound.
pub trait Cloud:
    IdentityService
    + ObjectStore
    + MessagingService
    + CatalogService
    + QueryService
    + LogService
    + Send
    + Sync
{
}

impl<T> Cloud for T where
    T: IdentityService
        + ObjectStore
        + MessagingService
        + CatalogService
        + QueryService
        + LogService
        + Send
        + Sync
{
}
