use super::*;

impl PolicyService {
    /// Validates and stores one threshold profile, replacing any previous version.
    pub async fn save_profile(
        &self,
        name: &str,
        hot_days: u32,
        warm_days: u32,
        cold_days: u32,
        description: Option<String>,
    ) -> AppResult<ThresholdProfile> {
        let profile = ThresholdProfile::new(name.trim(), hot_days, warm_days, cold_days, description)?;
        self.repository.save_profile(profile.clone()).await?;

        info!(
            profile = %profile.name(),
            hot_days,
            warm_days,
            cold_days,
            "threshold profile saved"
        );
        Ok(profile)
    }

    /// Lists threshold profiles.
    pub async fn list_profiles(&self) -> AppResult<Vec<ThresholdProfile>> {
        self.repository.list_profiles().await
    }

    /// Deletes one threshold profile; rejected while any policy references it.
    pub async fn delete_profile(&self, name: &str) -> AppResult<()> {
        if self.repository.find_profile(name).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "threshold profile '{name}' does not exist"
            )));
        }

        let referencing: Vec<String> = self
            .repository
            .list_policies()
            .await?
            .into_iter()
            .filter(|policy| policy.threshold_profile() == Some(name))
            .map(|policy| policy.name().as_str().to_owned())
            .collect();
        if !referencing.is_empty() {
            return Err(AppError::Conflict(format!(
                "threshold profile '{name}' is referenced by policies: {}",
                referencing.join(", ")
            )));
        }

        self.repository.delete_profile(name).await?;
        info!(profile = name, "threshold profile deleted");
        Ok(())
    }
}
