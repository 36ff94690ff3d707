use std::sync::Arc;

use strata_core::AppResult;
use strata_domain::{LifecycleSettings, Policy, Thresholds};
use tracing::warn;

use crate::lifecycle_ports::PolicyRepository;

/// Resolves the HOT/WARM/COLD cutoffs that apply to one policy.
#[derive(Clone)]
pub struct ThresholdResolver {
    repository: Arc<dyn PolicyRepository>,
}

impl ThresholdResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(repository: Arc<dyn PolicyRepository>) -> Self {
        Self { repository }
    }

    /// Returns the policy's profile cutoffs, or the snapshot defaults.
    ///
    /// A referenced profile that no longer exists falls back to the defaults.
    pub async fn resolve(
        &self,
        policy: &Policy,
        settings: &LifecycleSettings,
    ) -> AppResult<Thresholds> {
        let Some(profile_name) = policy.threshold_profile() else {
            return Ok(settings.thresholds());
        };

        match self.repository.find_profile(profile_name).await? {
            Some(profile) => Ok(profile.thresholds()),
            None => {
                warn!(
                    policy = %policy.name(),
                    profile = profile_name,
                    "threshold profile not found, using default thresholds"
                );
                Ok(settings.thresholds())
            }
        }
    }
}
