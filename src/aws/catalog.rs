//! Data catalog operations over Glue.

use async_trait::async_trait;
use aws_sdk_glue::operation::get_classifier::GetClassifierError;
use aws_sdk_glue::operation::get_crawler::GetCrawlerError;
use aws_sdk_glue::operation::get_database::GetDatabaseError;
use aws_sdk_glue::types::{
    CrawlerLineageSettings, CrawlerState as GlueCrawlerState, CrawlerTargets,
    CreateCsvClassifierRequest, CsvHeaderOption, DatabaseInput, DeleteBehavior,
    LineageConfiguration, RecrawlBehavior, RecrawlPolicy, S3Target, SchemaChangePolicy,
    UpdateBehavior,
};

use super::AwsCloud;
use super::error::from_sdk;
use crate::provider::{CatalogService, CrawlerSpec, CrawlerState, ProviderError, TableSummary};

#[async_trait]
impl CatalogService for AwsCloud {
    async fn database_exists(&self, region: &str, name: &str) -> Result<bool, ProviderError> {
        match self.glue(region).get_database().name(name).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetDatabaseError::is_entity_not_found_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("get_database", err)),
        }
    }

    async fn create_database(
        &self,
        region: &str,
        name: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let input = DatabaseInput::builder()
            .name(name)
            .description(description)
            .build()
            .map_err(|err| ProviderError::other("create_database", err.to_string()))?;
        self.glue(region)
            .create_database()
            .database_input(input)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("create_database", err))
    }

    async fn classifier_exists(&self, region: &str, name: &str) -> Result<bool, ProviderError> {
        match self.glue(region).get_classifier().name(name).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetClassifierError::is_entity_not_found_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("get_classifier", err)),
        }
    }

    async fn create_csv_classifier(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        let classifier = CreateCsvClassifierRequest::builder()
            .name(name)
            .delimiter(",")
            .quote_symbol("\"")
            .contains_header(CsvHeaderOption::Present)
            .disable_value_trimming(false)
            .allow_single_column(false)
            .build()
            .map_err(|err| ProviderError::other("create_classifier", err.to_string()))?;
        self.glue(region)
            .create_classifier()
            .csv_classifier(classifier)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("create_classifier", err))
    }

    async fn crawler_exists(&self, region: &str, name: &str) -> Result<bool, ProviderError> {
        match self.glue(region).get_crawler().name(name).send().await {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetCrawlerError::is_entity_not_found_exception) =>
            {
                Ok(false)
            }
            Err(err) => Err(from_sdk("get_crawler", err)),
        }
    }

    async fn create_crawler(&self, region: &str, spec: &CrawlerSpec) -> Result<(), ProviderError> {
        let output_behaviour = serde_json::json!({
            "Version": 1.0,
            "CrawlerOutput": {
                "Partitions": { "AddOrUpdateBehavior": "InheritFromTable" },
                "Tables": { "AddOrUpdateBehavior": "MergeNewColumns" },
            },
        });
        self.glue(region)
            .create_crawler()
            .name(&spec.name)
            .role(&spec.role_arn)
            .database_name(&spec.database)
            .description(&spec.description)
            .targets(
                CrawlerTargets::builder()
                    .s3_targets(S3Target::builder().path(&spec.target_path).build())
                    .build(),
            )
            .classifiers(&spec.classifier)
            .table_prefix(&spec.table_prefix)
            .schema_change_policy(
                SchemaChangePolicy::builder()
                    .update_behavior(UpdateBehavior::UpdateInDatabase)
                    .delete_behavior(DeleteBehavior::Log)
                    .build(),
            )
            .recrawl_policy(
                RecrawlPolicy::builder()
                    .recrawl_behavior(RecrawlBehavior::CrawlEverything)
                    .build(),
            )
            .lineage_configuration(
                LineageConfiguration::builder()
                    .crawler_lineage_settings(CrawlerLineageSettings::Disable)
                    .build(),
            )
            .configuration(output_behaviour.to_string())
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("create_crawler", err))
    }

    async fn start_crawler(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.glue(region)
            .start_crawler()
            .name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("start_crawler", err))
    }

    async fn crawler_state(&self, region: &str, name: &str) -> Result<CrawlerState, ProviderError> {
        let output = self
            .glue(region)
            .get_crawler()
            .name(name)
            .send()
            .await
            .map_err(|err| from_sdk("get_crawler", err))?;
        let state = output
            .crawler()
            .and_then(|crawler| crawler.state())
            .ok_or_else(|| ProviderError::other("get_crawler", "response missing state"))?;
        Ok(match state {
            GlueCrawlerState::Ready => CrawlerState::Ready,
            GlueCrawlerState::Running => CrawlerState::Running,
            GlueCrawlerState::Stopping => CrawlerState::Stopping,
            other => CrawlerState::Other(other.as_str().to_owned()),
        })
    }

    async fn stop_crawler(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.glue(region)
            .stop_crawler()
            .name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("stop_crawler", err))
    }

    async fn list_tables(
        &self,
        region: &str,
        database: &str,
    ) -> Result<Vec<TableSummary>, ProviderError> {
        let output = self
            .glue(region)
            .get_tables()
            .database_name(database)
            .send()
            .await
            .map_err(|err| from_sdk("get_tables", err))?;
        Ok(output
            .table_list()
            .iter()
            .map(|table| TableSummary {
                name: table.name().to_owned(),
                column_count: table
                    .storage_descriptor()
                    .map_or(0, |descriptor| descriptor.columns().len()),
            })
            .collect())
    }

    async fn delete_crawler(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.glue(region)
            .delete_crawler()
            .name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_crawler", err))
    }

    async fn delete_classifier(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.glue(region)
            .delete_classifier()
            .name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_classifier", err))
    }

    async fn delete_database(&self, region: &str, name: &str) -> Result<(), ProviderError> {
        self.glue(region)
            .delete_database()
            .name(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_database", err))
    }
}
