//! Provisioner for the catalog group: database, CSV classifier, and
//! crawler over the target bucket.

use crate::provider::{CatalogService, CrawlerSpec};
use crate::report;
use crate::state::{GroupStatus, StateDocument, StatusKey};

use super::ProvisionError;

const DATABASE_DESCRIPTION: &str = "Catalog for objects copied by the pipeline";
const CRAWLER_DESCRIPTION: &str = "Crawls the target bucket and catalogs copied objects";

/// Creates the catalog database, classifier, and crawler.
#[derive(Debug)]
pub struct CatalogProvisioner<'a, C> {
    cloud: &'a C,
}

impl<'a, C> CatalogProvisioner<'a, C>
where
    C: CatalogService + Sync,
{
    /// Creates a provisioner over the given provider.
    #[must_use]
    pub const fn new(cloud: &'a C) -> Self {
        Self { cloud }
    }

    /// Ensures database, classifier, and crawler exist and records the
    /// crawler's identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on the first unclassified provider
    /// failure, after marking the catalog status key `failed`, and
    /// [`ProvisionError::MissingIdentifier`] when earlier groups have not
    /// recorded the identifiers this one links to.
    pub async fn run(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        if let Err(err) = self.provision(state).await {
            state
                .deployment_status
                .set(StatusKey::Catalog, GroupStatus::Failed);
            return Err(err);
        }
        Ok(())
    }

    async fn provision(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        let region = state.regions.target_region.clone();
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

        let database = state.resources.catalog.database_name.clone();
        if self.cloud.database_exists(&region, &database).await? {
            report::note(&format!("database {database} already exists"));
        } else {
            report::progress(&format!("creating catalog database {database}"));
            self.cloud
                .create_database(&region, &database, DATABASE_DESCRIPTION)
                .await?;
        }

        let classifier = state.resources.catalog.classifier_name.clone();
        if self.cloud.classifier_exists(&region, &classifier).await? {
            report::note(&format!("classifier {classifier} already exists"));
        } else {
            report::progress(&format!("creating CSV classifier {classifier}"));
            self.cloud.create_csv_classifier(&region, &classifier).await?;
        }

        let crawler = state.resources.catalog.crawler_name.clone();
        let target_bucket = state
            .resources
            .storage
            .target_bucket
            .rendered_name(&account_id);
        let target_path = format!("s3://{target_bucket}/");

        if self.cloud.crawler_exists(&region, &crawler).await? {
            report::note(&format!("crawler {crawler} already exists"));
        } else {
            report::progress(&format!("creating crawler {crawler} over {target_path}"));
            self.cloud
                .create_crawler(
                    &region,
                    &CrawlerSpec {
                        name: crawler.clone(),
                        role_arn,
                        database,
                        classifier,
                        table_prefix: state.resources.catalog.table_prefix.clone(),
                        target_path: target_path.clone(),
                        description: CRAWLER_DESCRIPTION.to_owned(),
                    },
                )
                .await?;
        }

        let crawler_arn = format!("arn:aws:glue:{region}:{account_id}:crawler/{crawler}");
        report::success(&format!("crawler ready: {crawler_arn}"));
        state.resources.catalog.crawler_arn = Some(crawler_arn);
        state.resources.catalog.target_path = Some(target_path);
        state
            .deployment_status
            .set(StatusKey::Catalog, GroupStatus::Completed);
        Ok(())
    }
}
