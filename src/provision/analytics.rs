//! Provisioner for the analytics group: source-bucket event notifications,
//! the query results bucket, the workgroup, and operator query templates.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::provider::{ObjectStore, QueryService};
use crate::report;
use crate::state::{GroupStatus, StateDocument, StatusKey};

use super::ProvisionError;

/// Object-key suffix whose creation events feed the pipeline.
pub const NOTIFICATION_SUFFIX: &str = ".csv";

/// Wires notifications, ensures the results bucket and workgroup, and
/// writes operator query templates.
#[derive(Debug)]
pub struct AnalyticsProvisioner<'a, C> {
    cloud: &'a C,
    templates_dir: Utf8PathBuf,
}

impl<'a, C> AnalyticsProvisioner<'a, C>
where
    C: ObjectStore + QueryService + Sync,
{
    /// Creates a provisioner over the given provider, writing query
    /// templates into `templates_dir`.
    #[must_use]
    pub const fn new(cloud: &'a C, templates_dir: Utf8PathBuf) -> Self {
        Self {
            cloud,
            templates_dir,
        }
    }

    /// Applies the notification configuration, ensures the results bucket
    /// and workgroup, and records the result location.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on the first unclassified provider
    /// failure, after marking the owning status key `failed`, and
    /// [`ProvisionError::MissingIdentifier`] when earlier groups have not
    /// recorded the identifiers this one links to.
    pub async fn run(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        if let Err(err) = self.provision_notifications(state).await {
            state
                .deployment_status
                .set(StatusKey::Notifications, GroupStatus::Failed);
            return Err(err);
        }

        if let Err(err) = self.provision_query_service(state).await {
            state
                .deployment_status
                .set(StatusKey::QueryService, GroupStatus::Failed);
            return Err(err);
        }

        Ok(())
    }

    async fn provision_notifications(
        &self,
        state: &mut StateDocument,
    ) -> Result<(), ProvisionError> {
        let region = state.regions.source_region.clone();
        let account_id =
            state
                .account_id
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "account id",
                })?;
        let topic_arn =
            state
                .resources
                .topic
                .topic_arn
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "topic ARN",
                })?;
        let bucket = state
            .resources
            .storage
            .source_bucket
            .rendered_name(&account_id);

        report::progress(&format!(
            "configuring object-created notifications on {bucket} ({NOTIFICATION_SUFFIX} only)"
        ));
        self.cloud
            .configure_topic_notification(&region, &bucket, &topic_arn, NOTIFICATION_SUFFIX)
            .await?;
        report::success(&format!("notifications wired: {bucket} -> {topic_arn}"));
        state
            .deployment_status
            .set(StatusKey::Notifications, GroupStatus::Completed);
        Ok(())
    }

    async fn provision_query_service(
        &self,
        state: &mut StateDocument,
    ) -> Result<(), ProvisionError> {
        let region = state.regions.target_region.clone();
        let account_id =
            state
                .account_id
                .clone()
                .ok_or(ProvisionError::MissingIdentifier {
                    what: "account id",
                })?;

        let results_bucket = format!("caravan-query-results-{account_id}-{region}");
        if self.cloud.bucket_exists(&region, &results_bucket).await? {
            report::note(&format!("results bucket {results_bucket} already exists"));
        } else {
            report::progress(&format!("creating results bucket {results_bucket}"));
            if let Err(err) = self.cloud.create_bucket(&region, &results_bucket).await {
                if !err.is_already_exists() {
                    return Err(err.into());
                }
            }
            self.cloud.enable_versioning(&region, &results_bucket).await?;
            self.cloud
                .apply_default_encryption(&region, &results_bucket)
                .await?;
        }
        let output_location = format!("s3://{results_bucket}/");

        let workgroup = state.resources.query_service.workgroup.clone();
        match self.cloud.lookup_workgroup(&region, &workgroup).await? {
            Some(info) => {
                if info.output_location.as_deref() == Some(output_location.as_str()) {
                    report::note(&format!("workgroup {workgroup} already configured"));
                } else {
                    report::progress(&format!("reconciling workgroup {workgroup} output location"));
                    self.cloud
                        .update_workgroup_output(&region, &workgroup, &output_location)
                        .await?;
                }
            }
            None => {
                report::progress(&format!("creating workgroup {workgroup}"));
                self.cloud
                    .create_workgroup(&region, &workgroup, &output_location)
                    .await?;
            }
        }

        self.write_query_templates(state);

        report::success(&format!(
            "query service ready: workgroup {workgroup}, results at {output_location}"
        ));
        state.resources.query_service.results_bucket = Some(results_bucket);
        state.resources.query_service.query_result_location = Some(output_location);
        state
            .deployment_status
            .set(StatusKey::QueryService, GroupStatus::Completed);
        Ok(())
    }

    /// Writes operator query templates. Failures are reported but do not
    /// fail the group; the templates are a convenience, not a resource.
    fn write_query_templates(&self, state: &StateDocument) {
        let database = &state.resources.catalog.database_name;
        let prefix = &state.resources.catalog.table_prefix;
        let templates = query_templates(database, prefix);

        if let Err(message) = write_templates(&self.templates_dir, &templates) {
            report::warn(&format!("could not write query templates: {message}"));
            return;
        }
        report::progress(&format!(
            "wrote {} query templates to {}/",
            templates.len(),
            self.templates_dir
        ));
    }
}

fn query_templates(database: &str, table_prefix: &str) -> Vec<(&'static str, String)> {
    let example_table = format!("{table_prefix}table_name");
    vec![
        (
            "list_tables.sql",
            format!("-- List all tables in the pipeline database\nSHOW TABLES IN {database};\n"),
        ),
        (
            "describe_table.sql",
            format!(
                "-- Describe table structure (replace the table name)\nDESCRIBE {database}.{example_table};\n"
            ),
        ),
        (
            "sample_query.sql",
            format!(
                "-- Sample rows from copied data (replace the table name)\nSELECT *\nFROM {database}.{example_table}\nLIMIT 10;\n"
            ),
        ),
        (
            "count_records.sql",
            format!(
                "-- Count records in copied data (replace the table name)\nSELECT COUNT(*) AS total_records\nFROM {database}.{example_table};\n"
            ),
        ),
    ]
}

fn write_templates(dir: &Utf8Path, templates: &[(&'static str, String)]) -> Result<(), String> {
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| err.to_string())?;
    let handle = Dir::open_ambient_dir(dir, ambient_authority()).map_err(|err| err.to_string())?;
    for (name, contents) in templates {
        handle.write(name, contents).map_err(|err| err.to_string())?;
    }
    Ok(())
}
