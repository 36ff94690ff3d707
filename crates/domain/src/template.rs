use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_core::{AppError, AppResult, NonEmptyString};

use crate::boundary::TierConfig;
use crate::condition::ConditionExpr;
use crate::object::ObjectRef;
use crate::policy::{ActionType, PolicyInput, PolicyType};
use crate::tier::Temperature;

const DEFAULT_TEMPLATE_PRIORITY: i64 = 100;

/// One policy definition inside a template document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePolicyEntry {
    /// Name suffix; the generated policy is named `<object>_<policy_name>`.
    pub policy_name: String,
    /// Policy category.
    pub policy_type: PolicyType,
    /// Action type.
    pub action_type: ActionType,
    /// Tier whose location, codec and minimum age fill unset fields.
    #[serde(default)]
    pub tier: Option<Temperature>,
    /// Minimum age in days.
    #[serde(default)]
    pub age_days: Option<i64>,
    /// Minimum age in months.
    #[serde(default)]
    pub age_months: Option<i64>,
    /// Minimum coldness.
    #[serde(default)]
    pub access_pattern: Option<Temperature>,
    /// Minimum size in MiB.
    #[serde(default)]
    pub size_threshold_mb: Option<i64>,
    /// Declarative custom predicate.
    #[serde(default)]
    pub custom_condition: Option<ConditionExpr>,
    /// Target codec name.
    #[serde(default)]
    pub compression_type: Option<String>,
    /// Target storage location.
    #[serde(default)]
    pub target_location: Option<String>,
    /// Evaluation priority.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Enabled flag.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Threshold profile name.
    #[serde(default)]
    pub threshold_profile: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TieredDocument {
    #[serde(default)]
    tier_config: Option<Value>,
    #[serde(default)]
    policies: Vec<TemplatePolicyEntry>,
}

/// Parsed policy template document.
///
/// Accepts a legacy top-level array of entries and the tiered
/// `{ "tier_config": ..., "policies": [...] }` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTemplateDocument {
    tier_config: Option<TierConfig>,
    entries: Vec<TemplatePolicyEntry>,
}

impl PolicyTemplateDocument {
    /// Parses a template document.
    pub fn parse(document: &Value) -> AppResult<Self> {
        let mut entries = legacy_entries(document)?;
        let (tier_config, tiered) = tiered_entries(document)?;
        entries.extend(tiered);

        if entries.is_empty() {
            return Err(AppError::Validation(
                "policy template does not define any policies".to_owned(),
            ));
        }

        if entries.iter().any(|entry| entry.tier.is_some()) && tier_config.is_none() {
            return Err(AppError::Validation(
                "policy template entries reference a tier but no tier_config is defined"
                    .to_owned(),
            ));
        }

        Ok(Self {
            tier_config,
            entries,
        })
    }

    /// Returns the tier configuration, when the document is tiered.
    #[must_use]
    pub fn tier_config(&self) -> Option<&TierConfig> {
        self.tier_config.as_ref()
    }

    /// Returns the raw entries.
    #[must_use]
    pub fn entries(&self) -> &[TemplatePolicyEntry] {
        &self.entries
    }

    /// Expands entries into policy inputs for one target object.
    pub fn policy_inputs(&self, target: &ObjectRef) -> AppResult<Vec<PolicyInput>> {
        self.entries
            .iter()
            .map(|entry| self.expand(entry, target))
            .collect()
    }

    fn expand(&self, entry: &TemplatePolicyEntry, target: &ObjectRef) -> AppResult<PolicyInput> {
        let suffix = entry.policy_name.trim();
        if suffix.is_empty() {
            return Err(AppError::Validation(
                "policy template entry is missing policy_name".to_owned(),
            ));
        }

        let mut input = PolicyInput {
            name: format!("{}_{}", target.name(), suffix).to_ascii_lowercase(),
            owner: target.owner().to_owned(),
            object: target.name().to_owned(),
            policy_type: entry.policy_type,
            action_type: entry.action_type,
            age_days: entry.age_days,
            age_months: entry.age_months,
            access_pattern: entry.access_pattern,
            size_threshold_mb: entry.size_threshold_mb,
            custom_condition: entry.custom_condition.clone(),
            compression_type: entry.compression_type.clone(),
            target_location: entry.target_location.clone(),
            priority: entry.priority.unwrap_or(DEFAULT_TEMPLATE_PRIORITY),
            enabled: entry.enabled.unwrap_or(true),
            threshold_profile: entry.threshold_profile.clone(),
        };

        let Some(tier) = entry.tier else {
            return Ok(input);
        };
        let definition = self
            .tier_config
            .as_ref()
            .and_then(|config| config.tier(tier))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "policy template entry '{suffix}' references undefined tier '{tier}'"
                ))
            })?;

        if input.age_days.is_none() && input.age_months.is_none() {
            input.age_months = Some(i64::from(definition.min_age_months));
        }
        if input.compression_type.is_none() {
            input.compression_type = definition.codec.map(|codec| codec.as_str().to_owned());
        }
        if input.target_location.is_none() && input.action_type == ActionType::Move {
            input.target_location = definition.location.clone();
        }

        Ok(input)
    }
}

fn legacy_entries(document: &Value) -> AppResult<Vec<TemplatePolicyEntry>> {
    let Value::Array(_) = document else {
        return Ok(Vec::new());
    };

    serde_json::from_value::<Vec<TemplatePolicyEntry>>(document.clone())
        .map_err(|error| AppError::Validation(format!("invalid policy template entries: {error}")))
}

fn tiered_entries(
    document: &Value,
) -> AppResult<(Option<TierConfig>, Vec<TemplatePolicyEntry>)> {
    let Value::Object(_) = document else {
        return Ok((None, Vec::new()));
    };

    let tiered = serde_json::from_value::<TieredDocument>(document.clone())
        .map_err(|error| AppError::Validation(format!("invalid tiered policy template: {error}")))?;
    let tier_config = tiered
        .tier_config
        .as_ref()
        .map(TierConfig::from_json)
        .transpose()?;

    Ok((tier_config, tiered.policies))
}

/// Named, reusable template document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTemplate {
    name: NonEmptyString,
    description: Option<String>,
    document: Value,
}

impl PolicyTemplate {
    /// Creates a template after checking that its document parses.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        document: Value,
    ) -> AppResult<Self> {
        PolicyTemplateDocument::parse(&document)?;

        Ok(Self {
            name: NonEmptyString::new(name.into().trim())?,
            description: description.filter(|value| !value.trim().is_empty()),
            document,
        })
    }

    /// Returns the unique template name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the raw JSON document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Returns the parsed document.
    pub fn parsed(&self) -> AppResult<PolicyTemplateDocument> {
        PolicyTemplateDocument::parse(&self.document)
    }
}
