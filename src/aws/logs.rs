//! Execution log retrieval over CloudWatch Logs.

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::types::OrderBy;

use super::AwsCloud;
use super::error::from_sdk;
use crate::provider::{LogEvent, LogService, ProviderError};

#[async_trait]
impl LogService for AwsCloud {
    async fn recent_function_logs(
        &self,
        region: &str,
        function_name: &str,
        limit: i32,
    ) -> Result<Vec<LogEvent>, ProviderError> {
        let client = self.cloudwatch_logs(region);
        let log_group = format!("/aws/lambda/{function_name}");

        let streams = client
            .describe_log_streams()
            .log_group_name(&log_group)
            .order_by(OrderBy::LastEventTime)
            .descending(true)
            .limit(1)
            .send()
            .await
            .map_err(|err| from_sdk("describe_log_streams", err))?;
        let Some(stream_name) = streams
            .log_streams()
            .first()
            .and_then(|stream| stream.log_stream_name())
            .map(str::to_owned)
        else {
            return Ok(Vec::new());
        };

        let events = client
            .get_log_events()
            .log_group_name(&log_group)
            .log_stream_name(stream_name)
            .limit(limit)
            .send()
            .await
            .map_err(|err| from_sdk("get_log_events", err))?;
        Ok(events
            .events()
            .iter()
            .map(|event| LogEvent {
                timestamp_ms: event.timestamp().unwrap_or_default(),
                message: event.message().unwrap_or_default().to_owned(),
            })
            .collect())
    }
}
