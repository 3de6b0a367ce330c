//! AWS implementation of the provider traits.
//!
//! A single [`AwsCloud`] value wraps the ambient SDK configuration and
//! builds short-lived, region-scoped service clients per call, mirroring
//! how the pipeline addresses two regions at once. Service-family
//! implementations live in the submodules; error classification is shared
//! in [`error`].

mod catalog;
mod error;
mod identity;
mod logs;
mod messaging;
mod query;
mod storage;

use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Provider implementation backed by the official AWS SDK crates.
#[derive(Clone, Debug)]
pub struct AwsCloud {
    base: SdkConfig,
}

impl AwsCloud {
    /// Resolves ambient credentials and configuration and builds the
    /// provider.
    pub async fn load() -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self { base }
    }

    /// Builds the provider from an explicit SDK configuration.
    #[must_use]
    pub fn new(base: SdkConfig) -> Self {
        Self { base }
    }

    fn region(&self, region: &str) -> Region {
        Region::new(region.to_owned())
    }

    fn s3(&self, region: &str) -> aws_sdk_s3::Client {
        let conf = aws_sdk_s3::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }

    fn sns(&self, region: &str) -> aws_sdk_sns::Client {
        let conf = aws_sdk_sns::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_sns::Client::from_conf(conf)
    }

    fn sqs(&self, region: &str) -> aws_sdk_sqs::Client {
        let conf = aws_sdk_sqs::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_sqs::Client::from_conf(conf)
    }

    fn lambda(&self, region: &str) -> aws_sdk_lambda::Client {
        let conf = aws_sdk_lambda::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_lambda::Client::from_conf(conf)
    }

    fn glue(&self, region: &str) -> aws_sdk_glue::Client {
        let conf = aws_sdk_glue::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_glue::Client::from_conf(conf)
    }

    fn athena(&self, region: &str) -> aws_sdk_athena::Client {
        let conf = aws_sdk_athena::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_athena::Client::from_conf(conf)
    }

    fn cloudwatch_logs(&self, region: &str) -> aws_sdk_cloudwatchlogs::Client {
        let conf = aws_sdk_cloudwatchlogs::config::Builder::from(&self.base)
            .region(self.region(region))
            .build();
        aws_sdk_cloudwatchlogs::Client::from_conf(conf)
    }

    fn iam(&self) -> aws_sdk_iam::Client {
        aws_sdk_iam::Client::new(&self.base)
    }

    fn sts(&self) -> aws_sdk_sts::Client {
        aws_sdk_sts::Client::new(&self.base)
    }
}
