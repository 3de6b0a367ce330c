//! Object storage operations over S3.

use async_trait::async_trait;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete, Event,
    FilterRule, FilterRuleName, NotificationConfiguration, NotificationConfigurationFilter,
    ObjectIdentifier, S3KeyFilter, ServerSideEncryption, ServerSideEncryptionByDefault,
    ServerSideEncryptionConfiguration, ServerSideEncryptionRule, TopicConfiguration,
    VersioningConfiguration,
};

use super::AwsCloud;
use super::error::from_sdk;
use crate::provider::{ObjectStore, ObjectVersion, ProviderError};

/// Region whose bucket-creation calls must omit the location constraint.
const DEFAULT_REGION: &str = "us-east-1";

#[async_trait]
impl ObjectStore for AwsCloud {
    async fn bucket_exists(&self, region: &str, bucket: &str) -> Result<bool, ProviderError> {
        match self.s3(region).head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadBucketError::is_not_found) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("head_bucket", err)),
        }
    }

    async fn create_bucket(&self, region: &str, bucket: &str) -> Result<(), ProviderError> {
        let mut request = self.s3(region).create_bucket().bucket(bucket);
        if region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("create_bucket", err))
    }

    async fn enable_versioning(&self, region: &str, bucket: &str) -> Result<(), ProviderError> {
        self.s3(region)
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("put_bucket_versioning", err))
    }

    async fn apply_default_encryption(
        &self,
        region: &str,
        bucket: &str,
    ) -> Result<(), ProviderError> {
        let default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::Aes256)
            .build()
            .map_err(|err| ProviderError::other("put_bucket_encryption", err.to_string()))?;
        let configuration = ServerSideEncryptionConfiguration::builder()
            .rules(
                ServerSideEncryptionRule::builder()
                    .apply_server_side_encryption_by_default(default)
                    .build(),
            )
            .build()
            .map_err(|err| ProviderError::other("put_bucket_encryption", err.to_string()))?;
        self.s3(region)
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(configuration)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("put_bucket_encryption", err))
    }

    async fn put_object(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), ProviderError> {
        self.s3(region)
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("put_object", err))
    }

    async fn object_exists(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> Result<bool, ProviderError> {
        match self
            .s3(region)
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("head_object", err)),
        }
    }

    async fn configure_topic_notification(
        &self,
        region: &str,
        bucket: &str,
        topic_arn: &str,
        suffix: &str,
    ) -> Result<(), ProviderError> {
        let filter = NotificationConfigurationFilter::builder()
            .key(
                S3KeyFilter::builder()
                    .filter_rules(
                        FilterRule::builder()
                            .name(FilterRuleName::Suffix)
                            .value(suffix)
                            .build(),
                    )
                    .build(),
            )
            .build();
        let topic_configuration = TopicConfiguration::builder()
            .id("object-created-to-topic")
            .topic_arn(topic_arn)
            .events(Event::from("s3:ObjectCreated:*"))
            .filter(filter)
            .build()
            .map_err(|err| {
                ProviderError::other("put_bucket_notification_configuration", err.to_string())
            })?;
        self.s3(region)
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(
                NotificationConfiguration::builder()
                    .topic_configurations(topic_configuration)
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("put_bucket_notification_configuration", err))
    }

    async fn list_object_versions(
        &self,
        region: &str,
        bucket: &str,
    ) -> Result<Vec<ObjectVersion>, ProviderError> {
        let client = self.s3(region);
        let mut collected = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let mut request = client.list_object_versions().bucket(bucket);
            if let Some(marker) = &key_marker {
                request = request.key_marker(marker);
            }
            if let Some(marker) = &version_marker {
                request = request.version_id_marker(marker);
            }
            let page = request
                .send()
                .await
                .map_err(|err| from_sdk("list_object_versions", err))?;

            for version in page.versions() {
                if let (Some(key), Some(version_id)) = (version.key(), version.version_id()) {
                    collected.push(ObjectVersion {
                        key: key.to_owned(),
                        version_id: version_id.to_owned(),
                    });
                }
            }
            for marker in page.delete_markers() {
                if let (Some(key), Some(version_id)) = (marker.key(), marker.version_id()) {
                    collected.push(ObjectVersion {
                        key: key.to_owned(),
                        version_id: version_id.to_owned(),
                    });
                }
            }

            if page.is_truncated() == Some(true) {
                key_marker = page.next_key_marker().map(str::to_owned);
                version_marker = page.next_version_id_marker().map(str::to_owned);
            } else {
                return Ok(collected);
            }
        }
    }

    async fn delete_object_versions(
        &self,
        region: &str,
        bucket: &str,
        versions: &[ObjectVersion],
    ) -> Result<(), ProviderError> {
        let objects = versions
            .iter()
            .map(|version| {
                ObjectIdentifier::builder()
                    .key(&version.key)
                    .version_id(&version.version_id)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ProviderError::other("delete_objects", err.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|err| ProviderError::other("delete_objects", err.to_string()))?;
        self.s3(region)
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_objects", err))
    }

    async fn delete_bucket(&self, region: &str, bucket: &str) -> Result<(), ProviderError> {
        self.s3(region)
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_bucket", err))
    }
}
