//! Provisioner for the messaging group: notification topic, delivery
//! queue, copy function, and the wiring between them.

use std::time::Duration;

use tokio::time::sleep;

use crate::payload;
use crate::provider::{FunctionSpec, MessagingService, QueueSettings};
use crate::report;
use crate::state::{GroupStatus, StateDocument, StatusKey};

use super::{ProvisionError, queue_send_policy, timestamp_suffix, topic_publish_policy};

const FUNCTION_DESCRIPTION: &str = "Copies created objects from the source to the target bucket";
const FUNCTION_TIMEOUT_SECS: i32 = 300;
const FUNCTION_MEMORY_MB: i32 = 256;
const MAPPING_BATCH_SIZE: i32 = 10;
const MAPPING_BATCHING_WINDOW_SECS: i32 = 5;

/// Role changes propagate with a delay on the provider side; a freshly
/// created role is not immediately usable by the function service.
const DEFAULT_ROLE_PROPAGATION_WAIT: Duration = Duration::from_secs(10);

/// Creates the topic, queue, function, and their subscriptions.
#[derive(Debug)]
pub struct MessagingProvisioner<'a, C> {
    cloud: &'a C,
    role_propagation_wait: Duration,
}

impl<'a, C> MessagingProvisioner<'a, C>
where
    C: MessagingService + Sync,
{
    /// Creates a provisioner over the given provider.
    #[must_use]
    pub const fn new(cloud: &'a C) -> Self {
        Self {
            cloud,
            role_propagation_wait: DEFAULT_ROLE_PROPAGATION_WAIT,
        }
    }

    /// Overrides the role-propagation wait.
    ///
    /// This is primarily used by tests to keep runs fast.
    #[must_use]
    pub const fn with_role_propagation_wait(mut self, wait: Duration) -> Self {
        self.role_propagation_wait = wait;
        self
    }

    /// Ensures topic, queue, subscription, function, and event mapping
    /// exist and records their identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on the first unclassified provider
    /// failure, after marking the owning status key `failed`, and
    /// [`ProvisionError::MissingIdentifier`] when the foundation group has
    /// not recorded its identifiers yet.
    pub async fn run(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        let account_id =
            state
                .account_id
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "account id",
                })?;
        let role_arn =
            state
                .resources
                .identity
                .role_arn
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "service role ARN",
                })?;

        if let Err(err) = self.provision_topic(state, &account_id).await {
            state
                .deployment_status
                .set(StatusKey::Topic, GroupStatus::Failed);
            return Err(err);
        }

        if let Err(err) = self.provision_queue(state).await {
            state
                .deployment_status
                .set(StatusKey::Queue, GroupStatus::Failed);
            return Err(err);
        }

        if let Err(err) = self.provision_function(state, &account_id, &role_arn).await {
            state
                .deployment_status
                .set(StatusKey::Function, GroupStatus::Failed);
            return Err(err);
        }

        Ok(())
    }

    async fn provision_topic(
        &self,
        state: &mut StateDocument,
        account_id: &str,
    ) -> Result<(), ProvisionError> {
        let region = state.regions.source_region.clone();
        let source_bucket = state
            .resources
            .storage
            .source_bucket
            .rendered_name(account_id);

        let existing = match &state.resources.topic.topic_arn {
            Some(arn) if self.cloud.topic_exists(&region, arn).await? => Some(arn.clone()),
            _ => None,
        };

        let topic_arn = if let Some(arn) = existing {
            report::note(&format!("topic already exists: {arn}"));
            arn
        } else {
            let name = format!("{}-{}", state.resources.topic.topic_name, timestamp_suffix());
            report::progress(&format!("creating topic {name} in {region}"));
            let arn = self.cloud.create_topic(&region, &name).await?;
            self.cloud
                .set_topic_policy(
                    &region,
                    &arn,
                    &topic_publish_policy(&arn, account_id, &source_bucket),
                )
                .await?;
            state.resources.topic.topic_name = name;
            arn
        };

        report::success(&format!("topic ready: {topic_arn}"));
        state.resources.topic.topic_arn = Some(topic_arn);
        state
            .deployment_status
            .set(StatusKey::Topic, GroupStatus::Completed);
        Ok(())
    }

    async fn provision_queue(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        let region = state.regions.target_region.clone();
        let topic_region = state.regions.source_region.clone();
        let topic_arn =
            state
                .resources
                .topic
                .topic_arn
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "topic ARN",
                })?;

        let existing = match &state.resources.queue.queue_url {
            Some(url) if self.cloud.queue_exists(&region, url).await? => Some(url.clone()),
            _ => None,
        };

        let queue_url = if let Some(url) = existing {
            report::note(&format!("queue already exists: {url}"));
            url
        } else {
            let name = format!("{}-{}", state.resources.queue.queue_name, timestamp_suffix());
            report::progress(&format!("creating queue {name} in {region}"));
            let url = self
                .cloud
                .create_queue(&region, &name, &QueueSettings::default())
                .await?;
            state.resources.queue.queue_name = name;
            state.resources.queue.subscribed_to_topic = false;
            url
        };

        let queue_arn = self.cloud.queue_arn(&region, &queue_url).await?;
        state.resources.queue.queue_url = Some(queue_url.clone());
        state.resources.queue.queue_arn = Some(queue_arn.clone());

        if state.resources.queue.subscribed_to_topic {
            report::note("topic subscription already established");
        } else {
            self.cloud
                .set_queue_policy(&region, &queue_url, &queue_send_policy(&queue_arn, &topic_arn))
                .await?;
            let subscription = self
                .cloud
                .subscribe_queue(&topic_region, &topic_arn, &queue_arn)
                .await?;
            report::progress(&format!("subscribed queue to topic: {subscription}"));
            state.resources.queue.subscribed_to_topic = true;
        }

        report::success(&format!("queue ready: {queue_arn}"));
        state
            .deployment_status
            .set(StatusKey::Queue, GroupStatus::Completed);
        Ok(())
    }

    async fn provision_function(
        &self,
        state: &mut StateDocument,
        account_id: &str,
        role_arn: &str,
    ) -> Result<(), ProvisionError> {
        let region = state.regions.target_region.clone();
        let function_name = state.resources.function.function_name.clone();
        let queue_arn =
            state
                .resources
                .queue
                .queue_arn
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "queue ARN",
                })?;

        let function_arn = match self.cloud.function_arn(&region, &function_name).await? {
            Some(arn) => {
                report::note(&format!("function {function_name} already exists"));
                arn
            }
            None => {
                report::progress("waiting for role propagation");
                sleep(self.role_propagation_wait).await;

                let target_bucket = state
                    .resources
                    .storage
                    .target_bucket
                    .rendered_name(account_id);
                let spec = FunctionSpec {
                    name: function_name.clone(),
                    role_arn: role_arn.to_owned(),
                    runtime: payload::HANDLER_RUNTIME.to_owned(),
                    handler: payload::HANDLER_ENTRY_POINT.to_owned(),
                    description: FUNCTION_DESCRIPTION.to_owned(),
                    timeout_secs: FUNCTION_TIMEOUT_SECS,
                    memory_mb: FUNCTION_MEMORY_MB,
                    environment: vec![
                        (
                            String::from("SOURCE_REGION"),
                            state.regions.source_region.clone(),
                        ),
                        (String::from("TARGET_REGION"), region.clone()),
                        (String::from("TARGET_BUCKET"), target_bucket),
                    ],
                    package: payload::build_function_package()?,
                };
                report::progress(&format!("creating function {function_name}"));
                self.cloud.create_function(&region, &spec).await?
            }
        };
        state.resources.function.function_arn = Some(function_arn.clone());

        let mapping = match self
            .cloud
            .event_source_mapping_for(&region, &function_name, &queue_arn)
            .await?
        {
            Some(uuid) => {
                report::note(&format!("queue trigger already exists: {uuid}"));
                uuid
            }
            None => {
                self.cloud
                    .create_event_source_mapping(
                        &region,
                        &function_name,
                        &queue_arn,
                        MAPPING_BATCH_SIZE,
                        MAPPING_BATCHING_WINDOW_SECS,
                    )
                    .await?
            }
        };
        report::success(&format!("function ready: {function_arn} (trigger {mapping})"));
        state
            .deployment_status
            .set(StatusKey::Function, GroupStatus::Completed);
        Ok(())
    }
}
