//! Provisioner for the foundation group: the service role and the source
//! and target buckets.

use crate::provider::{IdentityService, ObjectStore};
use crate::report;
use crate::state::{BucketSpec, GroupStatus, StateDocument, StatusKey};

use super::{ProvisionError, managed_policy_arn, role_trust_policy};

const ROLE_DESCRIPTION: &str = "Service role for the cross-region copy pipeline";

/// Creates the service role and both versioned, encrypted buckets.
#[derive(Debug)]
pub struct FoundationProvisioner<'a, C> {
    cloud: &'a C,
}

impl<'a, C> FoundationProvisioner<'a, C>
where
    C: IdentityService + ObjectStore + Sync,
{
    /// Creates a provisioner over the given provider.
    #[must_use]
    pub const fn new(cloud: &'a C) -> Self {
        Self { cloud }
    }

    /// Ensures the role and buckets exist and records their identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] on the first unclassified provider
    /// failure, after marking the owning status key `failed`.
    pub async fn run(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        let account_id = self.ensure_account_id(state).await?;

        if let Err(err) = self.provision_role(state).await {
            state
                .deployment_status
                .set(StatusKey::Identity, GroupStatus::Failed);
            return Err(err);
        }

        if let Err(err) = self.provision_buckets(state, &account_id).await {
            state
                .deployment_status
                .set(StatusKey::Storage, GroupStatus::Failed);
            return Err(err);
        }

        Ok(())
    }

    async fn ensure_account_id(
        &self,
        state: &mut StateDocument,
    ) -> Result<String, ProvisionError> {
        if let Some(account_id) = &state.account_id {
            return Ok(account_id.clone());
        }
        let account_id = self.cloud.account_id().await?;
        report::progress(&format!("account: {account_id}"));
        state.account_id = Some(account_id.clone());
        Ok(account_id)
    }

    async fn provision_role(&self, state: &mut StateDocument) -> Result<(), ProvisionError> {
        let role_name = state.resources.identity.role_name.clone();
        let policies = state.resources.identity.policies_attached.clone();

        let role_arn = match self.cloud.role_arn(&role_name).await? {
            Some(existing) => {
                report::note(&format!("role {role_name} already exists"));
                existing
            }
            None => {
                report::progress(&format!("creating role {role_name}"));
                let created = self
                    .cloud
                    .create_role(&role_name, &role_trust_policy(), ROLE_DESCRIPTION)
                    .await?;
                for policy in &policies {
                    self.cloud
                        .attach_role_policy(&role_name, &managed_policy_arn(policy))
                        .await?;
                    report::progress(&format!("attached policy {policy}"));
                }
                created
            }
        };

        report::success(&format!("role ready: {role_arn}"));
        state.resources.identity.role_arn = Some(role_arn);
        state
            .deployment_status
            .set(StatusKey::Identity, GroupStatus::Completed);
        Ok(())
    }

    async fn provision_buckets(
        &self,
        state: &mut StateDocument,
        account_id: &str,
    ) -> Result<(), ProvisionError> {
        let source = state.resources.storage.source_bucket.clone();
        let source_name = self.provision_bucket(&source, account_id).await?;
        state.resources.storage.source_bucket.name = source_name;

        let target = state.resources.storage.target_bucket.clone();
        let target_name = self.provision_bucket(&target, account_id).await?;
        state.resources.storage.target_bucket.name = target_name;

        state
            .deployment_status
            .set(StatusKey::Storage, GroupStatus::Completed);
        Ok(())
    }

    /// Ensures one bucket exists with versioning and default encryption,
    /// returning its concrete name.
    async fn provision_bucket(
        &self,
        spec: &BucketSpec,
        account_id: &str,
    ) -> Result<String, ProvisionError> {
        let name = spec.rendered_name(account_id);
        if self.cloud.bucket_exists(&spec.region, &name).await? {
            report::note(&format!("bucket {name} already exists"));
            return Ok(name);
        }

        report::progress(&format!("creating bucket {name} in {}", spec.region));
        if let Err(err) = self.cloud.create_bucket(&spec.region, &name).await {
            // Lost the race or a previous run created it: fall through to
            // the baseline configuration either way.
            if !err.is_already_exists() {
                return Err(err.into());
            }
            report::note(&format!("bucket {name} already owned"));
        }
        self.cloud.enable_versioning(&spec.region, &name).await?;
        self.cloud
            .apply_default_encryption(&spec.region, &name)
            .await?;
        report::success(&format!("bucket ready: {name} (versioned, encrypted)"));
        Ok(name)
    }
}
