//! Notification topic, delivery queue, and copy function operations over
//! SNS, SQS, and Lambda.

use async_trait::async_trait;
use aws_sdk_lambda::operation::get_function::GetFunctionError;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, Runtime};
use aws_sdk_sns::operation::get_topic_attributes::GetTopicAttributesError;
use aws_sdk_sqs::operation::get_queue_attributes::GetQueueAttributesError;
use aws_sdk_sqs::types::QueueAttributeName;

use super::AwsCloud;
use super::error::from_sdk;
use crate::provider::{FunctionSpec, MessagingService, ProviderError, QueueSettings};

#[async_trait]
impl MessagingService for AwsCloud {
    async fn topic_exists(&self, region: &str, topic_arn: &str) -> Result<bool, ProviderError> {
        match self
            .sns(region)
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetTopicAttributesError::is_not_found_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("get_topic_attributes", err)),
        }
    }

    async fn create_topic(&self, region: &str, name: &str) -> Result<String, ProviderError> {
        let output = self
            .sns(region)
            .create_topic()
            .name(name)
            .send()
            .await
            .map_err(|err| from_sdk("create_topic", err))?;
        output
            .topic_arn()
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::other("create_topic", "response missing topic ARN"))
    }

    async fn set_topic_policy(
        &self,
        region: &str,
        topic_arn: &str,
        policy: &str,
    ) -> Result<(), ProviderError> {
        self.sns(region)
            .set_topic_attributes()
            .topic_arn(topic_arn)
            .attribute_name("Policy")
            .attribute_value(policy)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("set_topic_attributes", err))
    }

    async fn delete_topic(&self, region: &str, topic_arn: &str) -> Result<(), ProviderError> {
        self.sns(region)
            .delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_topic", err))
    }

    async fn queue_exists(&self, region: &str, queue_url: &str) -> Result<bool, ProviderError> {
        match self
            .sqs(region)
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetQueueAttributesError::is_queue_does_not_exist) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("get_queue_attributes", err)),
        }
    }

    async fn create_queue(
        &self,
        region: &str,
        name: &str,
        settings: &QueueSettings,
    ) -> Result<String, ProviderError> {
        let output = self
            .sqs(region)
            .create_queue()
            .queue_name(name)
            .attributes(
                QueueAttributeName::VisibilityTimeout,
                settings.visibility_timeout_secs.to_string(),
            )
            .attributes(
                QueueAttributeName::MessageRetentionPeriod,
                settings.retention_secs.to_string(),
            )
            .attributes(
                QueueAttributeName::ReceiveMessageWaitTimeSeconds,
                settings.receive_wait_secs.to_string(),
            )
            .send()
            .await
            .map_err(|err| from_sdk("create_queue", err))?;
        output
            .queue_url()
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::other("create_queue", "response missing queue URL"))
    }

    async fn queue_arn(&self, region: &str, queue_url: &str) -> Result<String, ProviderError> {
        let output = self
            .sqs(region)
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|err| from_sdk("get_queue_attributes", err))?;
        output
            .attributes()
            .and_then(|attributes| attributes.get(&QueueAttributeName::QueueArn))
            .map(String::clone)
            .ok_or_else(|| ProviderError::other("get_queue_attributes", "response missing ARN"))
    }

    async fn set_queue_policy(
        &self,
        region: &str,
        queue_url: &str,
        policy: &str,
    ) -> Result<(), ProviderError> {
        self.sqs(region)
            .set_queue_attributes()
            .queue_url(queue_url)
            .attributes(QueueAttributeName::Policy, policy)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("set_queue_attributes", err))
    }

    async fn subscribe_queue(
        &self,
        region: &str,
        topic_arn: &str,
        queue_arn: &str,
    ) -> Result<String, ProviderError> {
        let output = self
            .sns(region)
            .subscribe()
            .topic_arn(topic_arn)
            .protocol("sqs")
            .endpoint(queue_arn)
            .return_subscription_arn(true)
            .send()
            .await
            .map_err(|err| from_sdk("subscribe", err))?;
        output
            .subscription_arn()
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::other("subscribe", "response missing subscription ARN"))
    }

    async fn delete_queue(&self, region: &str, queue_url: &str) -> Result<(), ProviderError> {
        self.sqs(region)
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_queue", err))
    }

    async fn function_arn(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<String>, ProviderError> {
        match self
            .lambda(region)
            .get_function()
            .function_name(name)
            .send()
            .await
        {
            Ok(output) => Ok(output
                .configuration()
                .and_then(|configuration| configuration.function_arn())
                .map(str::to_owned)),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetFunctionError::is_resource_not_found_exception) =>
            {
                Ok(None)
            }
            Err(err) => Err(from_sdk("get_function", err)),
        }
    }

    async fn create_function(
        &self,
        region: &str,
        spec: &FunctionSpec,
    ) -> Result<String, ProviderError> {
        let mut environment = Environment::builder();
        for (key, value) in &spec.environment {
            environment = environment.variables(key, value);
        }
        let output = self
            .lambda(region)
            .create_function()
            .function_name(&spec.name)
            .runtime(Runtime::from(spec.runtime.as_str()))
            .role(&spec.role_arn)
            .handler(&spec.handler)
            .description(&spec.description)
            .timeout(spec.timeout_secs)
            .memory_size(spec.memory_mb)
            .environment(environment.build())
            .code(
                FunctionCode::builder()
                    .zip_file(Blob::new(spec.package.clone()))
                    .build(),
            )
            .send()
            .await
            .map_err(|err| from_sdk("create_function", err))?;
        output
            .function_arn()
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::other("create_function", "response missing ARN"))
    }

    async fn event_source_mapping_for(
        &self,
        region: &str,
        function_name: &str,
        queue_arn: &str,
    ) -> Result<Option<String>, ProviderError> {
        let output = self
            .lambda(region)
            .list_event_source_mappings()
            .function_name(function_name)
            .send()
            .await
            .map_err(|err| from_sdk("list_event_source_mappings", err))?;
        Ok(output
            .event_source_mappings()
            .iter()
            .find(|mapping| mapping.event_source_arn() == Some(queue_arn))
            .and_then(|mapping| mapping.uuid())
            .map(str::to_owned))
    }

    async fn create_event_source_mapping(
        &self,
        region: &str,
        function_name: &str,
        queue_arn: &str,
        batch_size: i32,
        batching_window_secs: i32,
    ) -> Result<String, ProviderError> {
        let output = self
            .lambda(region)
            .create_event_source_mapping()
            .event_source_arn(queue_arn)
            .function_name(function_name)
            .batch_size(batch_size)
            .maximum_batching_window_in_seconds(batching_window_secs)
            .send()
            .await
            .map_err(|err| from_sdk("create_event_source_mapping", err))?;
        output
            .uuid()
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::other("create_event_source_mapping", "missing UUID"))
    }

    async fn delete_function(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.lambda(region)
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_function", err))
    }
}
