//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeCloud`] implements every provider trait in memory: resources live
//! in maps, identifiers follow the provider's ARN/URL shapes, and tests
//! can seed state, inject per-operation failures, and inspect creation
//! counters without touching a real provider.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::provider::{
    CatalogService, CrawlerSpec, CrawlerState, FunctionSpec, IdentityService, LogEvent, LogService,
    MessagingService, ObjectStore, ObjectVersion, ProviderError, QueryService, QueryState,
    QueueSettings, TableSummary, WorkgroupInfo,
};

/// Account id reported by the fake identity service.
pub const FAKE_ACCOUNT_ID: &str = "123456789012";

#[derive(Clone, Debug, Default)]
struct FakeBucket {
    region: String,
    versioning: bool,
    encrypted: bool,
    objects: BTreeMap<String, Vec<u8>>,
    versions: Vec<ObjectVersion>,
    notification: Option<(String, String)>,
}

#[derive(Clone, Debug)]
struct FakeRole {
    arn: String,
    attached: Vec<String>,
}

#[derive(Clone, Debug)]
struct FakeTopic {
    name: String,
    policy: Option<String>,
}

#[derive(Clone, Debug)]
struct FakeQueue {
    arn: String,
    settings: QueueSettings,
    policy: Option<String>,
}

#[derive(Clone, Debug)]
struct FakeFunction {
    arn: String,
    environment: Vec<(String, String)>,
    package_size: usize,
}

#[derive(Clone, Debug)]
struct FakeCrawler {
    spec: CrawlerSpec,
    state: CrawlerState,
}

#[derive(Clone, Debug)]
struct FakeQuery {
    state: QueryState,
    rows: Vec<Vec<String>>,
}

#[derive(Debug)]
struct FakeState {
    account_id: String,
    next_id: u64,
    create_calls: usize,
    failures: BTreeMap<&'static str, ProviderError>,
    roles: BTreeMap<String, FakeRole>,
    buckets: BTreeMap<String, FakeBucket>,
    replication_links: BTreeMap<String, String>,
    deletion_batches: BTreeMap<String, Vec<usize>>,
    topics: BTreeMap<String, FakeTopic>,
    subscriptions: Vec<(String, String)>,
    queues: BTreeMap<String, FakeQueue>,
    functions: BTreeMap<String, FakeFunction>,
    event_source_mappings: Vec<(String, String, String)>,
    databases: BTreeMap<String, String>,
    classifiers: BTreeSet<String>,
    crawlers: BTreeMap<String, FakeCrawler>,
    tables: BTreeMap<String, Vec<TableSummary>>,
    workgroups: BTreeMap<String, WorkgroupInfo>,
    queries: BTreeMap<String, FakeQuery>,
    query_rows: Vec<Vec<String>>,
    query_failure: Option<String>,
    stuck_crawler: bool,
    log_events: Vec<LogEvent>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            account_id: String::from(FAKE_ACCOUNT_ID),
            next_id: 0,
            create_calls: 0,
            failures: BTreeMap::new(),
            roles: BTreeMap::new(),
            buckets: BTreeMap::new(),
            replication_links: BTreeMap::new(),
            deletion_batches: BTreeMap::new(),
            topics: BTreeMap::new(),
            subscriptions: Vec::new(),
            queues: BTreeMap::new(),
            functions: BTreeMap::new(),
            event_source_mappings: Vec::new(),
            databases: BTreeMap::new(),
            classifiers: BTreeSet::new(),
            crawlers: BTreeMap::new(),
            tables: BTreeMap::new(),
            workgroups: BTreeMap::new(),
            queries: BTreeMap::new(),
            query_rows: Vec::new(),
            query_failure: None,
            stuck_crawler: false,
            log_events: Vec::new(),
        }
    }
}

/// In-memory provider double implementing every provider trait.
#[derive(Clone, Debug, Default)]
pub struct FakeCloud {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeCloud {
    /// Creates an empty fake provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scripted_failure(&self, operation: &'static str) -> Result<(), ProviderError> {
        match self.state().failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        state.next_id
    }

    fn count_create(&self) {
        self.state().create_calls += 1;
    }

    /// Number of creation calls performed so far.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.state().create_calls
    }

    /// Scripts `error` as the outcome of the next call to `operation`.
    pub fn inject_failure(&self, operation: &'static str, error: ProviderError) {
        self.state().failures.insert(operation, error);
    }

    /// Mirrors objects put into `source` into `target`, emulating the
    /// pipeline's copy function.
    pub fn link_replication(&self, source: &str, target: &str) {
        self.state()
            .replication_links
            .insert(source.to_owned(), target.to_owned());
    }

    /// Seeds an existing bucket.
    pub fn seed_bucket(&self, region: &str, name: &str) {
        self.state().buckets.insert(
            name.to_owned(),
            FakeBucket {
                region: region.to_owned(),
                versioning: true,
                encrypted: true,
                ..FakeBucket::default()
            },
        );
    }

    /// Seeds object versions (and delete markers) into a bucket.
    pub fn seed_object_versions(&self, bucket: &str, versions: Vec<ObjectVersion>) {
        if let Some(record) = self.state().buckets.get_mut(bucket) {
            record.versions = versions;
        }
    }

    /// Seeds catalog tables for a database.
    pub fn seed_tables(&self, database: &str, tables: Vec<TableSummary>) {
        self.state().tables.insert(database.to_owned(), tables);
    }

    /// Seeds the rows served by subsequent queries (first row is the
    /// header).
    pub fn seed_query_rows(&self, rows: Vec<Vec<String>>) {
        self.state().query_rows = rows;
    }

    /// Seeds recent function log events.
    pub fn seed_log_events(&self, events: Vec<LogEvent>) {
        self.state().log_events = events;
    }

    /// Makes the crawler report `Running` forever after being started.
    pub fn set_stuck_crawler(&self, stuck: bool) {
        self.state().stuck_crawler = stuck;
    }

    /// Makes the next submitted query fail with `reason`.
    pub fn fail_next_query(&self, reason: &str) {
        self.state().query_failure = Some(reason.to_owned());
    }

    /// Batch sizes of version-deletion calls issued against `bucket`.
    #[must_use]
    pub fn deletion_batches(&self, bucket: &str) -> Vec<usize> {
        self.state()
            .deletion_batches
            .get(bucket)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of versions still present in `bucket`.
    #[must_use]
    pub fn remaining_versions(&self, bucket: &str) -> usize {
        self.state()
            .buckets
            .get(bucket)
            .map_or(0, |bucket| bucket.versions.len())
    }

    /// True when the bucket exists.
    #[must_use]
    pub fn has_bucket(&self, name: &str) -> bool {
        self.state().buckets.contains_key(name)
    }

    /// True when the role exists.
    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.state().roles.contains_key(name)
    }

    /// True when the function exists.
    #[must_use]
    pub fn has_function(&self, name: &str) -> bool {
        self.state().functions.contains_key(name)
    }

    /// True when the catalog database exists.
    #[must_use]
    pub fn has_database(&self, name: &str) -> bool {
        self.state().databases.contains_key(name)
    }

    /// True when the crawler exists.
    #[must_use]
    pub fn has_crawler(&self, name: &str) -> bool {
        self.state().crawlers.contains_key(name)
    }

    /// True when the workgroup exists.
    #[must_use]
    pub fn has_workgroup(&self, name: &str) -> bool {
        self.state().workgroups.contains_key(name)
    }

    /// ARNs of every existing topic.
    #[must_use]
    pub fn topic_arns(&self) -> Vec<String> {
        self.state().topics.keys().cloned().collect()
    }

    /// URLs of every existing queue.
    #[must_use]
    pub fn queue_urls(&self) -> Vec<String> {
        self.state().queues.keys().cloned().collect()
    }

    /// Environment recorded for a function, if it exists.
    #[must_use]
    pub fn function_environment(&self, name: &str) -> Option<Vec<(String, String)>> {
        self.state()
            .functions
            .get(name)
            .map(|function| function.environment.clone())
    }

    /// Notification wiring recorded for a bucket: `(topic_arn, suffix)`.
    #[must_use]
    pub fn bucket_notification(&self, name: &str) -> Option<(String, String)> {
        self.state()
            .buckets
            .get(name)
            .and_then(|bucket| bucket.notification.clone())
    }

    /// True when the bucket has versioning enabled.
    #[must_use]
    pub fn bucket_is_versioned(&self, name: &str) -> bool {
        self.state()
            .buckets
            .get(name)
            .is_some_and(|bucket| bucket.versioning)
    }

    /// True when the bucket has default encryption applied.
    #[must_use]
    pub fn bucket_is_encrypted(&self, name: &str) -> bool {
        self.state()
            .buckets
            .get(name)
            .is_some_and(|bucket| bucket.encrypted)
    }

    /// Region the bucket was created in.
    #[must_use]
    pub fn bucket_region(&self, name: &str) -> Option<String> {
        self.state()
            .buckets
            .get(name)
            .map(|bucket| bucket.region.clone())
    }

    /// Name the topic identified by `arn` was created under.
    #[must_use]
    pub fn topic_name(&self, arn: &str) -> Option<String> {
        self.state().topics.get(arn).map(|topic| topic.name.clone())
    }

    /// Access policy recorded for a topic.
    #[must_use]
    pub fn topic_policy(&self, arn: &str) -> Option<String> {
        self.state()
            .topics
            .get(arn)
            .and_then(|topic| topic.policy.clone())
    }

    /// Delivery settings the queue was created with.
    #[must_use]
    pub fn queue_settings(&self, url: &str) -> Option<QueueSettings> {
        self.state()
            .queues
            .get(url)
            .map(|queue| queue.settings.clone())
    }

    /// Access policy recorded for a queue.
    #[must_use]
    pub fn queue_policy(&self, url: &str) -> Option<String> {
        self.state()
            .queues
            .get(url)
            .and_then(|queue| queue.policy.clone())
    }

    /// Size of the deployment package the function was created with.
    #[must_use]
    pub fn function_package_size(&self, name: &str) -> Option<usize> {
        self.state()
            .functions
            .get(name)
            .map(|function| function.package_size)
    }

    /// Configuration the crawler was created with.
    #[must_use]
    pub fn crawler_spec(&self, name: &str) -> Option<CrawlerSpec> {
        self.state()
            .crawlers
            .get(name)
            .map(|crawler| crawler.spec.clone())
    }

    /// Output location recorded for a workgroup.
    #[must_use]
    pub fn workgroup_output(&self, name: &str) -> Option<String> {
        self.state()
            .workgroups
            .get(name)
            .and_then(|workgroup| workgroup.output_location.clone())
    }

    /// Topic and queue ARN pairs of every subscription.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.state().subscriptions.clone()
    }
}

#[async_trait]
impl IdentityService for FakeCloud {
    async fn account_id(&self) -> Result<String, ProviderError> {
        self.scripted_failure("account_id")?;
        Ok(self.state().account_id.clone())
    }

    async fn role_arn(&self, role_name: &str) -> Result<Option<String>, ProviderError> {
        self.scripted_failure("role_arn")?;
        Ok(self
            .state()
            .roles
            .get(role_name)
            .map(|role| role.arn.clone()))
    }

    async fn create_role(
        &self,
        role_name: &str,
        _trust_policy: &str,
        _description: &str,
    ) -> Result<String, ProviderError> {
        self.scripted_failure("create_role")?;
        self.count_create();
        let mut state = self.state();
        if state.roles.contains_key(role_name) {
            return Err(ProviderError::already_exists(
                "create_role",
                format!("role {role_name} already exists"),
            ));
        }
        let arn = format!("arn:aws:iam::{}:role/{role_name}", state.account_id);
        state.roles.insert(
            role_name.to_owned(),
            FakeRole {
                arn: arn.clone(),
                attached: Vec::new(),
            },
        );
        Ok(arn)
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("attach_role_policy")?;
        let mut state = self.state();
        let role = state.roles.get_mut(role_name).ok_or_else(|| {
            ProviderError::not_found("attach_role_policy", format!("no role {role_name}"))
        })?;
        role.attached.push(policy_arn.to_owned());
        Ok(())
    }

    async fn attached_policy_arns(&self, role_name: &str) -> Result<Vec<String>, ProviderError> {
        self.scripted_failure("attached_policy_arns")?;
        self.state()
            .roles
            .get(role_name)
            .map(|role| role.attached.clone())
            .ok_or_else(|| {
                ProviderError::not_found("attached_policy_arns", format!("no role {role_name}"))
            })
    }

    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("detach_role_policy")?;
        let mut state = self.state();
        let role = state.roles.get_mut(role_name).ok_or_else(|| {
            ProviderError::not_found("detach_role_policy", format!("no role {role_name}"))
        })?;
        role.attached.retain(|attached| attached != policy_arn);
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_role")?;
        self.state()
            .roles
            .remove(role_name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found("delete_role", format!("no role {role_name}")))
    }
}

#[async_trait]
impl ObjectStore for FakeCloud {
    async fn bucket_exists(&self, _region: &str, bucket: &str) -> Result<bool, ProviderError> {
        self.scripted_failure("bucket_exists")?;
        Ok(self.state().buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, region: &str, bucket: &str) -> Result<(), ProviderError> {
        self.scripted_failure("create_bucket")?;
        self.count_create();
        let mut state = self.state();
        if state.buckets.contains_key(bucket) {
            return Err(ProviderError::already_exists(
                "create_bucket",
                format!("bucket {bucket} already exists"),
            ));
        }
        state.buckets.insert(
            bucket.to_owned(),
            FakeBucket {
                region: region.to_owned(),
                ..FakeBucket::default()
            },
        );
        Ok(())
    }

    async fn enable_versioning(&self, _region: &str, bucket: &str) -> Result<(), ProviderError> {
        self.scripted_failure("enable_versioning")?;
        let mut state = self.state();
        let record = state.buckets.get_mut(bucket).ok_or_else(|| {
            ProviderError::not_found("enable_versioning", format!("no bucket {bucket}"))
        })?;
        record.versioning = true;
        Ok(())
    }

    async fn apply_default_encryption(
        &self,
        _region: &str,
        bucket: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("apply_default_encryption")?;
        let mut state = self.state();
        let record = state.buckets.get_mut(bucket).ok_or_else(|| {
            ProviderError::not_found("apply_default_encryption", format!("no bucket {bucket}"))
        })?;
        record.encrypted = true;
        Ok(())
    }

    async fn put_object(
        &self,
        _region: &str,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("put_object")?;
        let mut state = self.state();
        let target = state.replication_links.get(bucket).cloned();
        let record = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ProviderError::not_found("put_object", format!("no bucket {bucket}")))?;
        record.objects.insert(key.to_owned(), body.clone());
        if let Some(target_bucket) = target
            && let Some(target_record) = state.buckets.get_mut(&target_bucket)
        {
            target_record.objects.insert(key.to_owned(), body);
        }
        Ok(())
    }

    async fn object_exists(
        &self,
        _region: &str,
        bucket: &str,
        key: &str,
    ) -> Result<bool, ProviderError> {
        self.scripted_failure("object_exists")?;
        Ok(self
            .state()
            .buckets
            .get(bucket)
            .is_some_and(|record| record.objects.contains_key(key)))
    }

    async fn configure_topic_notification(
        &self,
        _region: &str,
        bucket: &str,
        topic_arn: &str,
        suffix: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("configure_topic_notification")?;
        let mut state = self.state();
        let record = state.buckets.get_mut(bucket).ok_or_else(|| {
            ProviderError::not_found(
                "configure_topic_notification",
                format!("no bucket {bucket}"),
            )
        })?;
        record.notification = Some((topic_arn.to_owned(), suffix.to_owned()));
        Ok(())
    }

    async fn list_object_versions(
        &self,
        _region: &str,
        bucket: &str,
    ) -> Result<Vec<ObjectVersion>, ProviderError> {
        self.scripted_failure("list_object_versions")?;
        self.state()
            .buckets
            .get(bucket)
            .map(|record| record.versions.clone())
            .ok_or_else(|| {
                ProviderError::not_found("list_object_versions", format!("no bucket {bucket}"))
            })
    }

    async fn delete_object_versions(
        &self,
        _region: &str,
        bucket: &str,
        versions: &[ObjectVersion],
    ) -> Result<(), ProviderError> {
        self.scripted_failure("delete_object_versions")?;
        let mut state = self.state();
        state
            .deletion_batches
            .entry(bucket.to_owned())
            .or_default()
            .push(versions.len());
        let record = state.buckets.get_mut(bucket).ok_or_else(|| {
            ProviderError::not_found("delete_object_versions", format!("no bucket {bucket}"))
        })?;
        record
            .versions
            .retain(|version| !versions.contains(version));
        Ok(())
    }

    async fn delete_bucket(&self, _region: &str, bucket: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_bucket")?;
        let mut state = self.state();
        let Some(record) = state.buckets.get(bucket) else {
            return Err(ProviderError::not_found(
                "delete_bucket",
                format!("no bucket {bucket}"),
            ));
        };
        if !record.versions.is_empty() {
            return Err(ProviderError::other(
                "delete_bucket",
                format!("bucket {bucket} is not empty"),
            ));
        }
        state.buckets.remove(bucket);
        Ok(())
    }
}

#[async_trait]
impl MessagingService for FakeCloud {
    async fn topic_exists(&self, _region: &str, topic_arn: &str) -> Result<bool, ProviderError> {
        self.scripted_failure("topic_exists")?;
        Ok(self.state().topics.contains_key(topic_arn))
    }

    async fn create_topic(&self, region: &str, name: &str) -> Result<String, ProviderError> {
        self.scripted_failure("create_topic")?;
        self.count_create();
        let mut state = self.state();
        let arn = format!("arn:aws:sns:{region}:{}:{name}", state.account_id);
        state.topics.insert(
            arn.clone(),
            FakeTopic {
                name: name.to_owned(),
                policy: None,
            },
        );
        Ok(arn)
    }

    async fn set_topic_policy(
        &self,
        _region: &str,
        topic_arn: &str,
        policy: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("set_topic_policy")?;
        let mut state = self.state();
        let topic = state.topics.get_mut(topic_arn).ok_or_else(|| {
            ProviderError::not_found("set_topic_policy", format!("no topic {topic_arn}"))
        })?;
        topic.policy = Some(policy.to_owned());
        Ok(())
    }

    async fn delete_topic(&self, _region: &str, topic_arn: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_topic")?;
        self.state()
            .topics
            .remove(topic_arn)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::not_found("delete_topic", format!("no topic {topic_arn}"))
            })
    }

    async fn queue_exists(&self, _region: &str, queue_url: &str) -> Result<bool, ProviderError> {
        self.scripted_failure("queue_exists")?;
        Ok(self.state().queues.contains_key(queue_url))
    }

    async fn create_queue(
        &self,
        region: &str,
        name: &str,
        settings: &QueueSettings,
    ) -> Result<String, ProviderError> {
        self.scripted_failure("create_queue")?;
        self.count_create();
        let mut state = self.state();
        let url = format!(
            "https://sqs.{region}.example.com/{}/{name}",
            state.account_id
        );
        let arn = format!("arn:aws:sqs:{region}:{}:{name}", state.account_id);
        state.queues.insert(
            url.clone(),
            FakeQueue {
                arn,
                settings: settings.clone(),
                policy: None,
            },
        );
        Ok(url)
    }

    async fn queue_arn(&self, _region: &str, queue_url: &str) -> Result<String, ProviderError> {
        self.scripted_failure("queue_arn")?;
        self.state()
            .queues
            .get(queue_url)
            .map(|queue| queue.arn.clone())
            .ok_or_else(|| ProviderError::not_found("queue_arn", format!("no queue {queue_url}")))
    }

    async fn set_queue_policy(
        &self,
        _region: &str,
        queue_url: &str,
        policy: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("set_queue_policy")?;
        let mut state = self.state();
        let queue = state.queues.get_mut(queue_url).ok_or_else(|| {
            ProviderError::not_found("set_queue_policy", format!("no queue {queue_url}"))
        })?;
        queue.policy = Some(policy.to_owned());
        Ok(())
    }

    async fn subscribe_queue(
        &self,
        _region: &str,
        topic_arn: &str,
        queue_arn: &str,
    ) -> Result<String, ProviderError> {
        self.scripted_failure("subscribe_queue")?;
        self.count_create();
        let id = self.next_id();
        self.state()
            .subscriptions
            .push((topic_arn.to_owned(), queue_arn.to_owned()));
        Ok(format!("{topic_arn}:subscription-{id}"))
    }

    async fn delete_queue(&self, _region: &str, queue_url: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_queue")?;
        self.state()
            .queues
            .remove(queue_url)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::not_found("delete_queue", format!("no queue {queue_url}"))
            })
    }

    async fn function_arn(
        &self,
        _region: &str,
        name: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.scripted_failure("function_arn")?;
        Ok(self
            .state()
            .functions
            .get(name)
            .map(|function| function.arn.clone()))
    }

    async fn create_function(
        &self,
        region: &str,
        spec: &FunctionSpec,
    ) -> Result<String, ProviderError> {
        self.scripted_failure("create_function")?;
        self.count_create();
        let mut state = self.state();
        if state.functions.contains_key(&spec.name) {
            return Err(ProviderError::already_exists(
                "create_function",
                format!("function {} already exists", spec.name),
            ));
        }
        let arn = format!(
            "arn:aws:lambda:{region}:{}:function:{}",
            state.account_id, spec.name
        );
        state.functions.insert(
            spec.name.clone(),
            FakeFunction {
                arn: arn.clone(),
                environment: spec.environment.clone(),
                package_size: spec.package.len(),
            },
        );
        Ok(arn)
    }

    async fn event_source_mapping_for(
        &self,
        _region: &str,
        function_name: &str,
        queue_arn: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.scripted_failure("event_source_mapping_for")?;
        Ok(self
            .state()
            .event_source_mappings
            .iter()
            .find(|(_, function, queue)| function == function_name && queue == queue_arn)
            .map(|(uuid, _, _)| uuid.clone()))
    }

    async fn create_event_source_mapping(
        &self,
        _region: &str,
        function_name: &str,
        queue_arn: &str,
        _batch_size: i32,
        _batching_window_secs: i32,
    ) -> Result<String, ProviderError> {
        self.scripted_failure("create_event_source_mapping")?;
        self.count_create();
        let uuid = format!("esm-{}", self.next_id());
        self.state().event_source_mappings.push((
            uuid.clone(),
            function_name.to_owned(),
            queue_arn.to_owned(),
        ));
        Ok(uuid)
    }

    async fn delete_function(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_function")?;
        self.state()
            .functions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::not_found("delete_function", format!("no function {name}"))
            })
    }
}

#[async_trait]
impl CatalogService for FakeCloud {
    async fn database_exists(&self, _region: &str, name: &str) -> Result<bool, ProviderError> {
        self.scripted_failure("database_exists")?;
        Ok(self.state().databases.contains_key(name))
    }

    async fn create_database(
        &self,
        _region: &str,
        name: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("create_database")?;
        self.count_create();
        self.state()
            .databases
            .insert(name.to_owned(), description.to_owned());
        Ok(())
    }

    async fn classifier_exists(&self, _region: &str, name: &str) -> Result<bool, ProviderError> {
        self.scripted_failure("classifier_exists")?;
        Ok(self.state().classifiers.contains(name))
    }

    async fn create_csv_classifier(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("create_csv_classifier")?;
        self.count_create();
        self.state().classifiers.insert(name.to_owned());
        Ok(())
    }

    async fn crawler_exists(&self, _region: &str, name: &str) -> Result<bool, ProviderError> {
        self.scripted_failure("crawler_exists")?;
        Ok(self.state().crawlers.contains_key(name))
    }

    async fn create_crawler(&self, _region: &str, spec: &CrawlerSpec) -> Result<(), ProviderError> {
        self.scripted_failure("create_crawler")?;
        self.count_create();
        self.state().crawlers.insert(
            spec.name.clone(),
            FakeCrawler {
                spec: spec.clone(),
                state: CrawlerState::Ready,
            },
        );
        Ok(())
    }

    async fn start_crawler(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("start_crawler")?;
        let mut state = self.state();
        let stuck = state.stuck_crawler;
        let crawler = state
            .crawlers
            .get_mut(name)
            .ok_or_else(|| ProviderError::not_found("start_crawler", format!("no crawler {name}")))?;
        crawler.state = if stuck {
            CrawlerState::Running
        } else {
            CrawlerState::Ready
        };
        Ok(())
    }

    async fn crawler_state(
        &self,
        _region: &str,
        name: &str,
    ) -> Result<CrawlerState, ProviderError> {
        self.scripted_failure("crawler_state")?;
        self.state()
            .crawlers
            .get(name)
            .map(|crawler| crawler.state.clone())
            .ok_or_else(|| ProviderError::not_found("crawler_state", format!("no crawler {name}")))
    }

    async fn stop_crawler(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("stop_crawler")?;
        let mut state = self.state();
        let crawler = state
            .crawlers
            .get_mut(name)
            .ok_or_else(|| ProviderError::not_found("stop_crawler", format!("no crawler {name}")))?;
        crawler.state = CrawlerState::Ready;
        Ok(())
    }

    async fn list_tables(
        &self,
        _region: &str,
        database: &str,
    ) -> Result<Vec<TableSummary>, ProviderError> {
        self.scripted_failure("list_tables")?;
        Ok(self
            .state()
            .tables
            .get(database)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_crawler(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_crawler")?;
        self.state()
            .crawlers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found("delete_crawler", format!("no crawler {name}")))
    }

    async fn delete_classifier(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_classifier")?;
        if self.state().classifiers.remove(name) {
            Ok(())
        } else {
            Err(ProviderError::not_found(
                "delete_classifier",
                format!("no classifier {name}"),
            ))
        }
    }

    async fn delete_database(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_database")?;
        self.state()
            .databases
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::not_found("delete_database", format!("no database {name}"))
            })
    }
}

#[async_trait]
impl QueryService for FakeCloud {
    async fn lookup_workgroup(
        &self,
        _region: &str,
        name: &str,
    ) -> Result<Option<WorkgroupInfo>, ProviderError> {
        self.scripted_failure("lookup_workgroup")?;
        Ok(self.state().workgroups.get(name).cloned())
    }

    async fn create_workgroup(
        &self,
        _region: &str,
        name: &str,
        output_location: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("create_workgroup")?;
        self.count_create();
        let mut state = self.state();
        if state.workgroups.contains_key(name) {
            return Err(ProviderError::already_exists(
                "create_workgroup",
                format!("workgroup {name} already exists"),
            ));
        }
        state.workgroups.insert(
            name.to_owned(),
            WorkgroupInfo {
                output_location: Some(output_location.to_owned()),
            },
        );
        Ok(())
    }

    async fn update_workgroup_output(
        &self,
        _region: &str,
        name: &str,
        output_location: &str,
    ) -> Result<(), ProviderError> {
        self.scripted_failure("update_workgroup_output")?;
        let mut state = self.state();
        let workgroup = state.workgroups.get_mut(name).ok_or_else(|| {
            ProviderError::not_found("update_workgroup_output", format!("no workgroup {name}"))
        })?;
        workgroup.output_location = Some(output_location.to_owned());
        Ok(())
    }

    async fn start_query(
        &self,
        _region: &str,
        _workgroup: &str,
        _sql: &str,
    ) -> Result<String, ProviderError> {
        self.scripted_failure("start_query")?;
        let id = format!("query-{}", self.next_id());
        let mut state = self.state();
        let query = match state.query_failure.take() {
            Some(reason) => FakeQuery {
                state: QueryState::Failed { reason },
                rows: Vec::new(),
            },
            None => FakeQuery {
                state: QueryState::Succeeded,
                rows: state.query_rows.clone(),
            },
        };
        state.queries.insert(id.clone(), query);
        Ok(id)
    }

    async fn query_state(
        &self,
        _region: &str,
        execution_id: &str,
    ) -> Result<QueryState, ProviderError> {
        self.scripted_failure("query_state")?;
        self.state()
            .queries
            .get(execution_id)
            .map(|query| query.state.clone())
            .ok_or_else(|| {
                ProviderError::not_found("query_state", format!("no execution {execution_id}"))
            })
    }

    async fn query_rows(
        &self,
        _region: &str,
        execution_id: &str,
    ) -> Result<Vec<Vec<String>>, ProviderError> {
        self.scripted_failure("query_rows")?;
        self.state()
            .queries
            .get(execution_id)
            .map(|query| query.rows.clone())
            .ok_or_else(|| {
                ProviderError::not_found("query_rows", format!("no execution {execution_id}"))
            })
    }

    async fn delete_workgroup(&self, _region: &str, name: &str) -> Result<(), ProviderError> {
        self.scripted_failure("delete_workgroup")?;
        self.state()
            .workgroups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::not_found("delete_workgroup", format!("no workgroup {name}"))
            })
    }
}

#[async_trait]
impl LogService for FakeCloud {
    async fn recent_function_logs(
        &self,
        _region: &str,
        _function_name: &str,
        limit: i32,
    ) -> Result<Vec<LogEvent>, ProviderError> {
        self.scripted_failure("recent_function_logs")?;
        let events = self.state().log_events.clone();
        let keep = usize::try_from(limit).unwrap_or(0);
        Ok(events.into_iter().take(keep).collect())
    }
}
