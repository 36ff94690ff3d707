use chrono::NaiveDate;
use serde::Deserialize;
use strata_application::ExecutionScope;
use strata_core::AppError;
use strata_domain::{ObjectRef, PolicyId, TierConfig, TierDefinition};
use uuid::Uuid;

/// Incoming payload for an access refresh; without an object every policy target is refreshed.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub owner: Option<String>,
    pub object: Option<String>,
}

impl RefreshRequest {
    /// Returns the requested object, if any.
    pub fn object(&self) -> Result<Option<ObjectRef>, AppError> {
        object_filter(self.owner.as_deref(), self.object.as_deref())
    }
}

/// Incoming payload for policy evaluation; without a policy every enabled policy runs.
#[derive(Debug, Default, Deserialize)]
pub struct EvaluateRequest {
    pub policy_id: Option<Uuid>,
}

/// Incoming payload for queue execution.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    pub max_actions: Option<usize>,
    #[serde(default)]
    pub simulate: bool,
    pub owner: Option<String>,
    pub object: Option<String>,
    pub policy_id: Option<Uuid>,
}

impl ExecuteRequest {
    /// Builds the execution scope; object and policy filters are exclusive.
    pub fn scope(&self) -> Result<ExecutionScope, AppError> {
        let object = object_filter(self.owner.as_deref(), self.object.as_deref())?;

        match (object, self.policy_id) {
            (None, None) => Ok(ExecutionScope::All),
            (Some(object), None) => Ok(ExecutionScope::Object(object)),
            (None, Some(policy_id)) => Ok(ExecutionScope::Policy(PolicyId::from_uuid(policy_id))),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "execution scope accepts either an object or a policy_id, not both".to_owned(),
            )),
        }
    }
}

/// Incoming payload for a manual merge.
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub owner: String,
    pub object: String,
    pub partition: String,
}

/// Incoming payload for one full scheduler cycle.
#[derive(Debug, Default, Deserialize)]
pub struct RunCycleRequest {
    pub max_actions: Option<usize>,
}

/// Query parameters of the evaluation queue listing.
#[derive(Debug, Default, Deserialize)]
pub struct QueueListQuery {
    pub policy_id: Option<Uuid>,
}

/// Tier layout submitted with a boundary preview.
#[derive(Debug, Deserialize)]
pub struct TierConfigRequest {
    pub enabled: Option<bool>,
    pub tiers: Vec<TierDefinition>,
}

/// Incoming payload for a partition boundary preview.
#[derive(Debug, Deserialize)]
pub struct BoundaryPreviewRequest {
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    pub today: Option<NaiveDate>,
    pub tier_config: Option<TierConfigRequest>,
}

/// Widest date range a boundary preview accepts, about one century.
pub const MAX_PREVIEW_SPAN_DAYS: i64 = 36_525;

impl BoundaryPreviewRequest {
    /// Rejects ranges whose layout would be unreasonably large to build.
    pub fn check_span(&self, today: NaiveDate) -> Result<(), AppError> {
        let newest = self.max_date.max(today);
        let span_days = (newest - self.min_date).num_days();
        if span_days > MAX_PREVIEW_SPAN_DAYS {
            return Err(AppError::Validation(format!(
                "boundary preview spans {span_days} days; at most {MAX_PREVIEW_SPAN_DAYS} are allowed"
            )));
        }

        Ok(())
    }

    /// Validates the optional tier layout.
    pub fn tier_config(&self) -> Result<Option<TierConfig>, AppError> {
        self.tier_config
            .as_ref()
            .map(|config| TierConfig::new(config.enabled.unwrap_or(true), config.tiers.clone()))
            .transpose()
    }
}

fn object_filter(owner: Option<&str>, object: Option<&str>) -> Result<Option<ObjectRef>, AppError> {
    match (owner, object) {
        (None, None) => Ok(None),
        (Some(owner), Some(object)) => ObjectRef::new(owner, object).map(Some),
        _ => Err(AppError::Validation(
            "owner and object must be given together".to_owned(),
        )),
    }
}
