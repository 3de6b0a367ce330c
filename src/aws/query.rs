//! Managed query operations over Athena.

use async_trait::async_trait;
use aws_sdk_athena::operation::get_work_group::GetWorkGroupError;
use aws_sdk_athena::types::{
    EncryptionConfiguration, EncryptionOption, QueryExecutionState, ResultConfiguration,
    ResultConfigurationUpdates, WorkGroupConfiguration, WorkGroupConfigurationUpdates,
};

use super::AwsCloud;
use super::error::from_sdk;
use crate::provider::{ProviderError, QueryService, QueryState, WorkgroupInfo};

fn sse_s3() -> Result<EncryptionConfiguration, ProviderError> {
    EncryptionConfiguration::builder()
        .encryption_option(EncryptionOption::SseS3)
        .build()
        .map_err(|err| ProviderError::other("workgroup_encryption", err.to_string()))
}

#[async_trait]
impl QueryService for AwsCloud {
    async fn lookup_workgroup(
        &self,
        region: &str,
        name: &str,
    ) -> Result<Option<WorkgroupInfo>, ProviderError> {
        match self
            .athena(region)
            .get_work_group()
            .work_group(name)
            .send()
            .await
        {
            Ok(output) => Ok(Some(WorkgroupInfo {
                output_location: output
                    .work_group()
                    .and_then(|workgroup| workgroup.configuration())
                    .and_then(|configuration| configuration.result_configuration())
                    .and_then(|result| result.output_location())
                    .map(str::to_owned),
            })),
            // A missing workgroup surfaces as an invalid-request error.
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetWorkGroupError::is_invalid_request_exception) =>
            {
                Ok(None)
            }
            Err(err) => Err(from_sdk("get_work_group", err)),
        }
    }

    async fn create_workgroup(
        &self,
        region: &str,
        name: &str,
        output_location: &str,
    ) -> Result<(), ProviderError> {
        let configuration = WorkGroupConfiguration::builder()
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .encryption_configuration(sse_s3()?)
                    .build(),
            )
            .enforce_work_group_configuration(false)
            .publish_cloud_watch_metrics_enabled(true)
            .build();
        self.athena(region)
            .create_work_group()
            .name(name)
            .description("Workgroup for cross-region copy pipeline queries")
            .configuration(configuration)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("create_work_group", err))
    }

    async fn update_workgroup_output(
        &self,
        region: &str,
        name: &str,
        output_location: &str,
    ) -> Result<(), ProviderError> {
        let updates = WorkGroupConfigurationUpdates::builder()
            .result_configuration_updates(
                ResultConfigurationUpdates::builder()
                    .output_location(output_location)
                    .encryption_configuration(sse_s3()?)
                    .build(),
            )
            .enforce_work_group_configuration(false)
            .publish_cloud_watch_metrics_enabled(true)
            .build();
        self.athena(region)
            .update_work_group()
            .work_group(name)
            .configuration_updates(updates)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("update_work_group", err))
    }

    async fn start_query(
        &self,
        region: &str,
        workgroup: &str,
        sql: &str,
    ) -> Result<String, ProviderError> {
        let output = self
            .athena(region)
            .start_query_execution()
            .query_string(sql)
            .work_group(workgroup)
            .send()
            .await
            .map_err(|err| from_sdk("start_query_execution", err))?;
        output
            .query_execution_id()
            .map(str::to_owned)
            .ok_or_else(|| {
                ProviderError::other("start_query_execution", "response missing execution id")
            })
    }

    async fn query_state(
        &self,
        region: &str,
        execution_id: &str,
    ) -> Result<QueryState, ProviderError> {
        let output = self
            .athena(region)
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|err| from_sdk("get_query_execution", err))?;
        let status = output
            .query_execution()
            .and_then(|execution| execution.status())
            .ok_or_else(|| ProviderError::other("get_query_execution", "response missing status"))?;
        let state = status
            .state()
            .ok_or_else(|| ProviderError::other("get_query_execution", "response missing state"))?;
        Ok(match state {
            QueryExecutionState::Queued => QueryState::Queued,
            QueryExecutionState::Running => QueryState::Running,
            QueryExecutionState::Succeeded => QueryState::Succeeded,
            QueryExecutionState::Cancelled => QueryState::Cancelled,
            _ => QueryState::Failed {
                reason: status
                    .state_change_reason()
                    .unwrap_or("no reason reported")
                    .to_owned(),
            },
        })
    }

    async fn query_rows(
        &self,
        region: &str,
        execution_id: &str,
    ) -> Result<Vec<Vec<String>>, ProviderError> {
        let output = self
            .athena(region)
            .get_query_results()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|err| from_sdk("get_query_results", err))?;
        let rows = output
            .result_set()
            .map(|result_set| result_set.rows())
            .unwrap_or_default();
        Ok(rows
            .iter()
            .map(|row| {
                row.data()
                    .iter()
                    .map(|datum| datum.var_char_value().unwrap_or_default().to_owned())
                    .collect()
            })
            .collect())
    }

    async fn delete_workgroup(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.athena(region)
            .delete_work_group()
            .work_group(name)
            .recursive_delete_option(true)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_work_group", err))
    }
}
