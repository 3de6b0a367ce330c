//! Best-effort decommissioning of every pipeline resource.
//!
//! Policy: continue past failures. Every deletion step runs regardless of
//! earlier outcomes; "already absent" responses count as success, and any
//! other failure is collected into the summary instead of halting the
//! sweep. This is the opposite of the deployer's fail-fast policy, chosen
//! so a partially broken stack can still be cleaned up as far as possible.
//!
//! Buckets are versioned, so each bucket is purged first: every object
//! version and delete marker is enumerated and deleted in batches before
//! the bucket-deletion call.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use chrono::Utc;
use thiserror::Error;

use crate::poll::{PollError, PollWindow, await_condition};
use crate::provider::{
    CatalogService, CrawlerState, IdentityService, MessagingService, ObjectStore, ProviderError,
    QueryService,
};
use crate::report;
use crate::state::{GroupStatus, StateDocument};
use crate::store::{StateStore, StateStoreError};

/// Literal the operator must type to confirm the sweep.
pub const CONFIRMATION_TOKEN: &str = "DELETE";

/// Largest batch accepted by the version-deletion call.
const DELETE_BATCH: usize = 1000;

const CRAWLER_STOP_WINDOW: PollWindow = PollWindow {
    interval: Duration::from_secs(5),
    timeout: Duration::from_secs(60),
};

/// True when `input` is the typed confirmation for resource deletion.
#[must_use]
pub fn confirmation_accepted(input: &str) -> bool {
    input.trim() == CONFIRMATION_TOKEN
}

/// Errors that abort the sweep before or after any deletions.
#[derive(Debug, Error)]
pub enum UnwindError {
    /// The state document could not be loaded or saved.
    #[error(transparent)]
    Store(#[from] StateStoreError),
}

/// Per-step outcomes of a sweep.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnwindSummary {
    /// Resources that were deleted.
    pub deleted: Vec<String>,
    /// Resources that were already absent.
    pub skipped: Vec<String>,
    /// Resources whose deletion failed, with the failure message.
    pub failures: Vec<(String, String)>,
}

impl UnwindSummary {
    /// True when no deletion step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, what: String, result: Result<(), ProviderError>) {
        match result {
            Ok(()) => {
                report::success(&format!("deleted {what}"));
                self.deleted.push(what);
            }
            Err(err) if err.is_not_found() => {
                report::note(&format!("{what} already absent"));
                self.skipped.push(what);
            }
            Err(err) => {
                report::failure(&format!("could not delete {what}: {err}"));
                self.failures.push((what, err.to_string()));
            }
        }
    }
}

/// Deletes every pipeline resource in reverse dependency order.
#[derive(Debug)]
pub struct Unwinder<'a, C> {
    cloud: &'a C,
    store: &'a StateStore,
    templates_dir: Utf8PathBuf,
    crawler_stop: PollWindow,
}

impl<'a, C> Unwinder<'a, C>
where
    C: ObjectStore + IdentityService + MessagingService + CatalogService + QueryService + Sync,
{
    /// Creates an unwinder removing local artifacts from `templates_dir`.
    #[must_use]
    pub const fn new(cloud: &'a C, store: &'a StateStore, templates_dir: Utf8PathBuf) -> Self {
        Self {
            cloud,
            store,
            templates_dir,
            crawler_stop: CRAWLER_STOP_WINDOW,
        }
    }

    /// Overrides the crawler stop wait.
    ///
    /// This is primarily used by tests to keep runs fast.
    #[must_use]
    pub const fn with_crawler_stop(mut self, window: PollWindow) -> Self {
        self.crawler_stop = window;
        self
    }

    /// Runs the sweep and marks every status slot `deleted`.
    ///
    /// # Errors
    ///
    /// Returns [`UnwindError::Store`] when the state document cannot be
    /// loaded or saved. Individual deletion failures never abort the
    /// sweep; they are collected into the returned summary.
    pub async fn unwind(&self) -> Result<UnwindSummary, UnwindError> {
        let mut state = self.store.load()?;
        report::banner("Decommissioning pipeline resources");
        report::progress(&format!(
            "regions: {} -> {}",
            state.regions.source_region, state.regions.target_region
        ));

        let mut summary = UnwindSummary::default();
        self.delete_buckets(&state, &mut summary).await;
        self.delete_workgroup(&state, &mut summary).await;
        self.delete_function(&state, &mut summary).await;
        self.delete_queue(&state, &mut summary).await;
        self.delete_topic(&state, &mut summary).await;
        self.delete_catalog(&state, &mut summary).await;
        self.delete_role(&state, &mut summary).await;
        self.remove_local_artifacts(&mut summary);

        state.deployment_status.mark_all(GroupStatus::Deleted);
        state.deletion_timestamp = Some(Utc::now());
        state.touch();
        self.store.save(&state)?;
        report::status_table(&state);

        if summary.is_clean() {
            report::success("decommissioning complete");
        } else {
            report::warn(&format!(
                "decommissioning finished with {} failure(s)",
                summary.failures.len()
            ));
        }
        Ok(summary)
    }

    async fn delete_buckets(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let account_id = state.account_id.clone().unwrap_or_default();
        let source = &state.resources.storage.source_bucket;
        let target = &state.resources.storage.target_bucket;

        let mut buckets = vec![
            (source.region.clone(), source.rendered_name(&account_id)),
            (target.region.clone(), target.rendered_name(&account_id)),
        ];
        if let Some(results) = &state.resources.query_service.results_bucket {
            buckets.push((state.regions.target_region.clone(), results.clone()));
        }

        for (region, bucket) in buckets {
            let result = self.purge_and_delete_bucket(&region, &bucket).await;
            summary.record(format!("bucket {bucket}"), result);
        }
    }

    /// Deletes every object version and delete marker, then the bucket.
    async fn purge_and_delete_bucket(
        &self,
        region: &str,
        bucket: &str,
    ) -> Result<(), ProviderError> {
        loop {
            let versions = self.cloud.list_object_versions(region, bucket).await?;
            if versions.is_empty() {
                break;
            }
            report::progress(&format!(
                "purging {} object version(s) from {bucket}",
                versions.len()
            ));
            for chunk in versions.chunks(DELETE_BATCH) {
                self.cloud
                    .delete_object_versions(region, bucket, chunk)
                    .await?;
            }
        }
        self.cloud.delete_bucket(region, bucket).await
    }

    async fn delete_workgroup(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let region = state.regions.target_region.as_str();
        let workgroup = state.resources.query_service.workgroup.clone();
        let result = self.cloud.delete_workgroup(region, &workgroup).await;
        summary.record(format!("workgroup {workgroup}"), result);
    }

    async fn delete_function(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let region = state.regions.target_region.as_str();
        let function = state.resources.function.function_name.clone();
        let result = self.cloud.delete_function(region, &function).await;
        summary.record(format!("function {function}"), result);
    }

    async fn delete_queue(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let region = state.regions.target_region.as_str();
        let Some(queue_url) = state.resources.queue.queue_url.clone() else {
            summary.skipped.push(String::from("queue (no URL recorded)"));
            report::note("queue has no recorded URL; nothing to delete");
            return;
        };
        let result = self.cloud.delete_queue(region, &queue_url).await;
        summary.record(format!("queue {queue_url}"), result);
    }

    async fn delete_topic(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let region = state.regions.source_region.as_str();
        let Some(topic_arn) = state.resources.topic.topic_arn.clone() else {
            summary.skipped.push(String::from("topic (no ARN recorded)"));
            report::note("topic has no recorded ARN; nothing to delete");
            return;
        };
        let result = self.cloud.delete_topic(region, &topic_arn).await;
        summary.record(format!("topic {topic_arn}"), result);
    }

    async fn delete_catalog(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let region = state.regions.target_region.as_str();
        let crawler = state.resources.catalog.crawler_name.clone();

        if let Err(err) = self.stop_crawler_if_running(region, &crawler).await {
            report::warn(&format!("could not stop crawler {crawler}: {err}"));
        }
        let result = self.cloud.delete_crawler(region, &crawler).await;
        summary.record(format!("crawler {crawler}"), result);

        let classifier = state.resources.catalog.classifier_name.clone();
        let result = self.cloud.delete_classifier(region, &classifier).await;
        summary.record(format!("classifier {classifier}"), result);

        let database = state.resources.catalog.database_name.clone();
        let result = self.cloud.delete_database(region, &database).await;
        summary.record(format!("database {database}"), result);
    }

    /// Stops a running crawler and waits for it to settle. An absent
    /// crawler is fine; deletion handles that case.
    async fn stop_crawler_if_running(
        &self,
        region: &str,
        crawler: &str,
    ) -> Result<(), ProviderError> {
        match self.cloud.crawler_state(region, crawler).await {
            Ok(CrawlerState::Running) => {}
            Ok(_) => return Ok(()),
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }

        report::progress(&format!("stopping running crawler {crawler}"));
        self.cloud.stop_crawler(region, crawler).await?;
        let cloud = self.cloud;
        await_condition(
            "crawler stop",
            self.crawler_stop.interval,
            self.crawler_stop.timeout,
            || async move {
                match cloud.crawler_state(region, crawler).await {
                    Ok(CrawlerState::Ready) => Ok(Some(())),
                    Ok(_) => Ok(None),
                    Err(err) => Err(err),
                }
            },
        )
        .await
        .map_err(|err| match err {
            PollError::TimedOut { what, timeout_secs } => ProviderError::other(
                "stop_crawler",
                format!("timed out after {timeout_secs}s waiting for {what}"),
            ),
            PollError::Probe(inner) => inner,
        })
    }

    async fn delete_role(&self, state: &StateDocument, summary: &mut UnwindSummary) {
        let role = state.resources.identity.role_name.clone();

        match self.cloud.attached_policy_arns(&role).await {
            Ok(arns) => {
                for arn in arns {
                    if let Err(err) = self.cloud.detach_role_policy(&role, &arn).await {
                        report::warn(&format!("could not detach {arn}: {err}"));
                    } else {
                        report::progress(&format!("detached policy {arn}"));
                    }
                }
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => report::warn(&format!("could not list policies of {role}: {err}")),
        }

        let result = self.cloud.delete_role(&role).await;
        summary.record(format!("role {role}"), result);
    }

    /// Removes the operator query-template directory.
    fn remove_local_artifacts(&self, summary: &mut UnwindSummary) {
        let what = format!("local templates {}", self.templates_dir);
        let parent = self
            .templates_dir
            .parent()
            .unwrap_or_else(|| Utf8Path::new("."));
        let Some(name) = self.templates_dir.file_name() else {
            summary
                .failures
                .push((what, String::from("path has no directory name")));
            return;
        };

        let removed = Dir::open_ambient_dir(parent, ambient_authority())
            .and_then(|dir| dir.remove_dir_all(name));
        match removed {
            Ok(()) => {
                report::success(&format!("removed {}", self.templates_dir));
                summary.deleted.push(what);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                report::note(&format!("{} already absent", self.templates_dir));
                summary.skipped.push(what);
            }
            Err(err) => {
                report::failure(&format!("could not remove {}: {err}", self.templates_dir));
                summary.failures.push((what, err.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_requires_the_exact_token() {
        assert!(confirmation_accepted("DELETE"));
        assert!(confirmation_accepted("  DELETE\n"));
        assert!(!confirmation_accepted("delete"));
        assert!(!confirmation_accepted("DELETE everything"));
        assert!(!confirmation_accepted(""));
    }
}
