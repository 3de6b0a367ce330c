//! Orchestrates the four provisioning steps in dependency order.
//!
//! Policy: fail fast. A step whose status keys are all `completed` is
//! skipped; the first failing step halts the sequence. The state document
//! is persisted and the aggregate status table reprinted after every step,
//! including the failing one.

use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::provider::Cloud;
use crate::provision::{
    AnalyticsProvisioner, CatalogProvisioner, FoundationProvisioner, MessagingProvisioner,
    ProvisionError,
};
use crate::report;
use crate::state::{DeploymentStatus, GroupStatus, StateDocument, StatusKey};
use crate::store::{StateStore, StateStoreError};

/// One orchestrated provisioning step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeployStep {
    /// Service role and buckets.
    Foundation,
    /// Topic, queue, function, and wiring.
    Messaging,
    /// Catalog database, classifier, and crawler.
    Catalog,
    /// Notifications, results bucket, workgroup, and query templates.
    Analytics,
}

impl DeployStep {
    /// The fixed dependency order steps run in.
    pub const SEQUENCE: [Self; 4] = [
        Self::Foundation,
        Self::Messaging,
        Self::Catalog,
        Self::Analytics,
    ];

    /// Human-readable description of the step.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Foundation => "service role and buckets",
            Self::Messaging => "topic, queue, and copy function",
            Self::Catalog => "catalog database and crawler",
            Self::Analytics => "notifications and query workgroup",
        }
    }

    /// Status keys this step owns.
    #[must_use]
    pub const fn status_keys(self) -> &'static [StatusKey] {
        match self {
            Self::Foundation => &[StatusKey::Identity, StatusKey::Storage],
            Self::Messaging => &[StatusKey::Topic, StatusKey::Queue, StatusKey::Function],
            Self::Catalog => &[StatusKey::Catalog],
            Self::Analytics => &[StatusKey::Notifications, StatusKey::QueryService],
        }
    }

    /// True when every status key the step owns is already `completed`.
    #[must_use]
    pub fn is_completed(self, status: &DeploymentStatus) -> bool {
        self.status_keys()
            .iter()
            .all(|key| status.get(*key) == GroupStatus::Completed)
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Foundation => "foundation",
            Self::Messaging => "messaging",
            Self::Catalog => "catalog",
            Self::Analytics => "analytics",
        };
        formatter.write_str(name)
    }
}

/// Errors raised by a deployment run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The state document could not be loaded or saved.
    #[error(transparent)]
    Store(#[from] StateStoreError),
    /// A provisioning step failed; later steps were not attempted.
    #[error("{step} step failed: {source}")]
    Step {
        /// Step that failed.
        step: DeployStep,
        /// Underlying provisioning failure.
        #[source]
        source: ProvisionError,
    },
}

/// Outcome of a successful deployment run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeploySummary {
    /// Steps whose provisioner actually ran.
    pub executed: Vec<DeployStep>,
    /// Steps skipped because they were already completed.
    pub skipped: Vec<DeployStep>,
}

/// Runs the provisioning sequence against a provider and a state store.
#[derive(Debug)]
pub struct Deployer<'a, C> {
    cloud: &'a C,
    store: &'a StateStore,
    templates_dir: Utf8PathBuf,
    role_propagation_wait: Option<Duration>,
}

impl<'a, C: Cloud> Deployer<'a, C> {
    /// Creates a deployer writing query templates into `templates_dir`.
    #[must_use]
    pub const fn new(cloud: &'a C, store: &'a StateStore, templates_dir: Utf8PathBuf) -> Self {
        Self {
            cloud,
            store,
            templates_dir,
            role_propagation_wait: None,
        }
    }

    /// Overrides the messaging step's role-propagation wait.
    ///
    /// This is primarily used by tests to keep runs fast.
    #[must_use]
    pub const fn with_role_propagation_wait(mut self, wait: Duration) -> Self {
        self.role_propagation_wait = Some(wait);
        self
    }

    /// Runs every step in order, skipping completed ones and halting on
    /// the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Store`] when the document cannot be loaded
    /// or saved and [`DeployError::Step`] when a provisioner fails. The
    /// document as of the failure is persisted before returning.
    pub async fn deploy(&self) -> Result<DeploySummary, DeployError> {
        let mut state = self.store.load()?;
        report::status_table(&state);

        let mut summary = DeploySummary::default();
        for step in DeployStep::SEQUENCE {
            if step.is_completed(&state.deployment_status) {
                report::note(&format!("skipping {step} - already completed"));
                summary.skipped.push(step);
                continue;
            }

            report::banner(&format!("Provisioning {}", step.title()));
            let result = self.run_step(step, &mut state).await;
            state.touch();
            self.store.save(&state)?;
            report::status_table(&state);

            match result {
                Ok(()) => summary.executed.push(step),
                Err(source) => {
                    report::failure(&format!("deployment halted at {step}"));
                    return Err(DeployError::Step { step, source });
                }
            }
        }

        report::success("deployment complete");
        Ok(summary)
    }

    /// Runs a single step regardless of the other steps' statuses,
    /// persisting the document afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Store`] when the document cannot be loaded
    /// or saved and [`DeployError::Step`] when the provisioner fails.
    pub async fn run_single(&self, step: DeployStep) -> Result<(), DeployError> {
        let mut state = self.store.load()?;
        report::banner(&format!("Provisioning {}", step.title()));
        let result = self.run_step(step, &mut state).await;
        state.touch();
        self.store.save(&state)?;
        report::status_table(&state);
        result.map_err(|source| DeployError::Step { step, source })
    }

    async fn run_step(
        &self,
        step: DeployStep,
        state: &mut StateDocument,
    ) -> Result<(), ProvisionError> {
        match step {
            DeployStep::Foundation => FoundationProvisioner::new(self.cloud).run(state).await,
            DeployStep::Messaging => {
                let mut provisioner = MessagingProvisioner::new(self.cloud);
                if let Some(wait) = self.role_propagation_wait {
                    provisioner = provisioner.with_role_propagation_wait(wait);
                }
                provisioner.run(state).await
            }
            DeployStep::Catalog => CatalogProvisioner::new(self.cloud).run(state).await,
            DeployStep::Analytics => {
                AnalyticsProvisioner::new(self.cloud, self.templates_dir.clone())
                    .run(state)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_covers_every_status_key() {
        let mut covered: Vec<StatusKey> = Vec::new();
        for step in DeployStep::SEQUENCE {
            covered.extend_from_slice(step.status_keys());
        }
        for key in StatusKey::ALL {
            assert!(covered.contains(&key), "{key:?} not owned by any step");
        }
        assert_eq!(covered.len(), StatusKey::ALL.len());
    }

    #[test]
    fn step_completion_requires_every_owned_key() {
        let mut status = DeploymentStatus::default();
        status.set(StatusKey::Identity, GroupStatus::Completed);
        assert!(!DeployStep::Foundation.is_completed(&status));

        status.set(StatusKey::Storage, GroupStatus::Completed);
        assert!(DeployStep::Foundation.is_completed(&status));
        assert!(!DeployStep::Messaging.is_completed(&status));
    }
}
