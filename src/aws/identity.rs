//! Identity operations over STS and IAM.

use async_trait::async_trait;
use aws_sdk_iam::operation::get_role::GetRoleError;

use super::AwsCloud;
use super::error::from_sdk;
use crate::provider::{IdentityService, ProviderError};

#[async_trait]
impl IdentityService for AwsCloud {
    async fn account_id(&self) -> Result<String, ProviderError> {
        let identity = self
            .sts()
            .get_caller_identity()
            .send()
            .await
            .map_err(|err| from_sdk("get_caller_identity", err))?;
        identity
            .account()
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::other("get_caller_identity", "response missing account"))
    }

    async fn role_arn(&self, role_name: &str) -> Result<Option<String>, ProviderError> {
        match self.iam().get_role().role_name(role_name).send().await {
            Ok(output) => Ok(output.role().map(|role| role.arn().to_owned())),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(GetRoleError::is_no_such_entity_exception) =>
            {
                Ok(None)
            }
            Err(err) => Err(from_sdk("get_role", err)),
        }
    }

    async fn create_role(
        &self,
        role_name: &str,
        trust_policy: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        let output = self
            .iam()
            .create_role()
            .role_name(role_name)
            .assume_role_policy_document(trust_policy)
            .description(description)
            .send()
            .await
            .map_err(|err| from_sdk("create_role", err))?;
        output
            .role()
            .map(|role| role.arn().to_owned())
            .ok_or_else(|| ProviderError::other("create_role", "response missing role"))
    }

    async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.iam()
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("attach_role_policy", err))
    }

    async fn attached_policy_arns(&self, role_name: &str) -> Result<Vec<String>, ProviderError> {
        let output = self
            .iam()
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|err| from_sdk("list_attached_role_policies", err))?;
        Ok(output
            .attached_policies()
            .iter()
            .filter_map(|policy| policy.policy_arn().map(str::to_owned))
            .collect())
    }

    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.iam()
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("detach_role_policy", err))
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        self.iam()
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| from_sdk("delete_role", err))
    }
}
