use std::collections::HashSet;

use super::*;

impl PolicyService {
    /// Validates and stores one policy template.
    pub async fn save_template(
        &self,
        name: &str,
        description: Option<String>,
        document: Value,
    ) -> AppResult<PolicyTemplate> {
        let template = PolicyTemplate::new(name, description, document)?;
        self.repository.save_template(template.clone()).await?;

        info!(template = %template.name(), "policy template saved");
        Ok(template)
    }

    /// Lists policy templates.
    pub async fn list_templates(&self) -> AppResult<Vec<PolicyTemplate>> {
        self.repository.list_templates().await
    }

    /// Deletes one policy template.
    pub async fn delete_template(&self, name: &str) -> AppResult<()> {
        if self.repository.find_template(name).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "policy template '{name}' does not exist"
            )));
        }

        self.repository.delete_template(name).await
    }

    /// Expands a template into policies for one object.
    ///
    /// Every generated definition is validated before anything is stored;
    /// one failure rejects the whole template.
    pub async fn apply_template(
        &self,
        source: TemplateSource,
        owner: &str,
        object: &str,
    ) -> AppResult<Vec<PolicyWriteResult>> {
        let document = match source {
            TemplateSource::Named(name) => self
                .repository
                .find_template(name.as_str())
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("policy template '{name}' does not exist"))
                })?
                .parsed()?,
            TemplateSource::Document(document) => {
                strata_domain::PolicyTemplateDocument::parse(&document)?
            }
        };
        let target = ObjectRef::new(owner, object)?;

        let mut policies = Vec::new();
        let mut names = HashSet::new();
        for input in document.policy_inputs(&target)? {
            let policy = self.validate(PolicyId::new(), input).await?;
            if !names.insert(policy.name().as_str().to_owned()) {
                return Err(
                    PolicyValidationError::DuplicatePolicyName(policy.name().as_str().to_owned())
                        .into(),
                );
            }
            self.ensure_unique_name(&policy).await?;
            policies.push(policy);
        }

        self.repository.create_policies(policies.clone()).await?;

        info!(
            object = %target,
            policies = policies.len(),
            "policy template applied"
        );
        Ok(policies.into_iter().map(Self::write_result).collect())
    }
}
