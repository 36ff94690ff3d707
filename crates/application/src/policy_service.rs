use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strata_core::{AppError, AppResult};
use strata_domain::{
    ActionType, ObjectRef, Policy, PolicyAdvisory, PolicyId, PolicyInput, PolicyTemplate,
    PolicyValidationError, ThresholdProfile,
};
use tracing::{info, warn};

use crate::lifecycle_ports::{EvaluationQueueRepository, PartitionCatalog, PolicyRepository};

mod profiles;
mod templates;

/// Accepted policy together with its advisories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyWriteResult {
    /// Stored policy.
    pub policy: Policy,
    /// Non-fatal observations about the definition.
    pub advisories: Vec<PolicyAdvisory>,
}

/// Source document for template application.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    /// A stored template by name.
    Named(String),
    /// An inline template document.
    Document(Value),
}

/// Policy, threshold profile and template administration.
#[derive(Clone)]
pub struct PolicyService {
    catalog: Arc<dyn PartitionCatalog>,
    repository: Arc<dyn PolicyRepository>,
    queue: Arc<dyn EvaluationQueueRepository>,
}

impl PolicyService {
    /// Creates a policy service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn PartitionCatalog>,
        repository: Arc<dyn PolicyRepository>,
        queue: Arc<dyn EvaluationQueueRepository>,
    ) -> Self {
        Self {
            catalog,
            repository,
            queue,
        }
    }

    /// Validates and stores a new policy.
    pub async fn create_policy(&self, input: PolicyInput) -> AppResult<PolicyWriteResult> {
        let policy = self.validate(PolicyId::new(), input).await?;
        self.ensure_unique_name(&policy).await?;
        self.repository.create_policy(policy.clone()).await?;

        info!(policy_id = %policy.id(), policy = %policy.name(), "policy created");
        Ok(Self::write_result(policy))
    }

    /// Validates and replaces an existing policy.
    pub async fn update_policy(
        &self,
        policy_id: PolicyId,
        input: PolicyInput,
    ) -> AppResult<PolicyWriteResult> {
        self.require_policy(policy_id).await?;

        let policy = self.validate(policy_id, input).await?;
        self.ensure_unique_name(&policy).await?;
        self.repository.update_policy(policy.clone()).await?;

        info!(policy_id = %policy.id(), policy = %policy.name(), "policy updated");
        Ok(Self::write_result(policy))
    }

    /// Enables or disables one policy.
    pub async fn set_policy_enabled(&self, policy_id: PolicyId, enabled: bool) -> AppResult<Policy> {
        let policy = self.require_policy(policy_id).await?.with_enabled(enabled);
        self.repository.update_policy(policy.clone()).await?;

        info!(policy_id = %policy_id, enabled, "policy enabled flag changed");
        Ok(policy)
    }

    /// Deletes one policy and its queue entries; audit rows are kept.
    pub async fn delete_policy(&self, policy_id: PolicyId) -> AppResult<()> {
        self.require_policy(policy_id).await?;
        self.repository.delete_policy(policy_id).await?;
        let removed = self.queue.delete_policy_entries(policy_id).await?;

        info!(policy_id = %policy_id, removed_queue_entries = removed, "policy deleted");
        Ok(())
    }

    /// Returns one policy.
    pub async fn get_policy(&self, policy_id: PolicyId) -> AppResult<Policy> {
        self.require_policy(policy_id).await
    }

    /// Lists all policies.
    pub async fn list_policies(&self) -> AppResult<Vec<Policy>> {
        self.repository.list_policies().await
    }

    /// Runs every write-time check and returns the validated policy.
    ///
    /// Checks short-circuit in order: target object, relocation location,
    /// then the definition itself, then the referenced threshold profile.
    pub async fn validate(&self, policy_id: PolicyId, input: PolicyInput) -> AppResult<Policy> {
        self.validate_target(&input).await?;

        if input.action_type == ActionType::Move
            && let Some(location) = input
                .target_location
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
            && !self.catalog.location_exists(location).await?
        {
            return Err(PolicyValidationError::InvalidLocation(location.to_ascii_uppercase()).into());
        }

        let policy = Policy::new(policy_id, input)?;

        if let Some(profile) = policy.threshold_profile()
            && self.repository.find_profile(profile).await?.is_none()
        {
            return Err(PolicyValidationError::ThresholdProfileNotFound(profile.to_owned()).into());
        }

        for advisory in policy.advisories() {
            warn!(
                policy = %policy.name(),
                advisory = advisory.message(),
                "policy accepted with advisory"
            );
        }

        Ok(policy)
    }

    async fn validate_target(&self, input: &PolicyInput) -> AppResult<()> {
        let object = ObjectRef::new(input.owner.as_str(), input.object.as_str())
            .map_err(|_| PolicyValidationError::MissingRequiredParameter("target_object"))?;

        match self.catalog.find_object(&object).await? {
            None => Err(PolicyValidationError::ObjectNotFound(object.to_string()).into()),
            Some(descriptor) if !descriptor.partitioned => {
                Err(PolicyValidationError::ObjectNotPartitioned(object.to_string()).into())
            }
            Some(_) => Ok(()),
        }
    }

    async fn ensure_unique_name(&self, policy: &Policy) -> AppResult<()> {
        match self
            .repository
            .find_policy_by_name(policy.name().as_str())
            .await?
        {
            Some(existing) if existing.id() != policy.id() => Err(
                PolicyValidationError::DuplicatePolicyName(policy.name().as_str().to_owned())
                    .into(),
            ),
            _ => Ok(()),
        }
    }

    async fn require_policy(&self, policy_id: PolicyId) -> AppResult<Policy> {
        self.repository
            .find_policy(policy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("policy '{policy_id}' does not exist")))
    }

    fn write_result(policy: Policy) -> PolicyWriteResult {
        let advisories = policy.advisories();
        PolicyWriteResult { policy, advisories }
    }
}
