use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_core::{AppError, AppResult, NonEmptyString};
use thiserror::Error;
use uuid::Uuid;

use crate::condition::{ConditionExpr, PartitionFacts};
use crate::object::ObjectRef;
use crate::tier::{CompressionCodec, Temperature};

/// Lowest accepted policy priority (evaluated first).
pub const POLICY_PRIORITY_MIN: i64 = 1;
/// Highest accepted policy priority.
pub const POLICY_PRIORITY_MAX: i64 = 999;

/// Stable policy identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyId(Uuid);

impl PolicyId {
    /// Creates a random policy identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a policy identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PolicyId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle policy category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyType {
    /// Recompresses partitions in place.
    Compression,
    /// Relocates partitions across storage tiers.
    Tiering,
    /// Removes partition data.
    Purge,
}

impl PolicyType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compression => "COMPRESSION",
            Self::Tiering => "TIERING",
            Self::Purge => "PURGE",
        }
    }

    /// Returns whether an action type may be used with this policy type.
    #[must_use]
    pub fn allows(&self, action: ActionType) -> bool {
        matches!(
            (self, action),
            (Self::Compression, ActionType::Compress)
                | (Self::Tiering, ActionType::Move)
                | (Self::Purge, ActionType::Drop | ActionType::Truncate)
        )
    }
}

impl FromStr for PolicyType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COMPRESSION" => Ok(Self::Compression),
            "TIERING" => Ok(Self::Tiering),
            "PURGE" => Ok(Self::Purge),
            _ => Err(AppError::Validation(format!(
                "unknown policy type '{value}'"
            ))),
        }
    }
}

/// Concrete action a policy performs on a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Recompresses with the target codec.
    Compress,
    /// Moves to the target location, optionally recompressing.
    Move,
    /// Drops the partition.
    Drop,
    /// Removes all rows but keeps the partition.
    Truncate,
}

impl ActionType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compress => "COMPRESS",
            Self::Move => "MOVE",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
        }
    }
}

impl FromStr for ActionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "COMPRESS" => Ok(Self::Compress),
            "MOVE" => Ok(Self::Move),
            "DROP" => Ok(Self::Drop),
            "TRUNCATE" => Ok(Self::Truncate),
            _ => Err(AppError::Validation(format!(
                "unknown action type '{value}'"
            ))),
        }
    }
}

/// Trigger conditions of a policy; every set condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Minimum age in days since the last write.
    pub age_days: Option<u32>,
    /// Minimum age in calendar months; wins over `age_days` when both are set.
    pub age_months: Option<u32>,
    /// Minimum coldness under the policy's resolved thresholds.
    pub access_pattern: Option<Temperature>,
    /// Minimum segment size in MiB.
    pub size_threshold_mb: Option<u64>,
    /// Declarative custom predicate.
    pub custom_condition: Option<ConditionExpr>,
}

/// Literal age rule used in direct evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeRule {
    /// Age in days.
    Days(u32),
    /// Age in whole calendar months.
    Months(u32),
}

impl TriggerCondition {
    /// Returns whether no trigger condition is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.age_days.is_none()
            && self.age_months.is_none()
            && self.access_pattern.is_none()
            && self.size_threshold_mb.is_none()
            && self.custom_condition.is_none()
    }

    /// Returns the effective literal age rule.
    #[must_use]
    pub fn age_rule(&self) -> Option<AgeRule> {
        self.age_months
            .map(AgeRule::Months)
            .or(self.age_days.map(AgeRule::Days))
    }

    /// Returns whether every set condition holds for the partition.
    pub fn matches(&self, facts: &PartitionFacts) -> AppResult<bool> {
        let age_holds = match self.age_rule() {
            Some(AgeRule::Months(months)) => facts.age_months >= i64::from(months),
            Some(AgeRule::Days(days)) => facts.age_days >= i64::from(days),
            None => true,
        };
        if !age_holds {
            return Ok(false);
        }

        if let Some(pattern) = self.access_pattern
            && !facts.temperature.is_at_least_as_cold_as(pattern)
        {
            return Ok(false);
        }

        if let Some(threshold_mb) = self.size_threshold_mb {
            let size_mb = u64::try_from(facts.size_bytes / (1024 * 1024)).unwrap_or(0);
            if size_mb < threshold_mb {
                return Ok(false);
            }
        }

        match &self.custom_condition {
            Some(condition) => condition.evaluate(facts),
            None => Ok(true),
        }
    }
}

/// Desired end state of a partition after a policy action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionTarget {
    /// Recompress in place.
    Compress {
        /// Target codec.
        codec: CompressionCodec,
    },
    /// Relocate, optionally recompressing.
    Move {
        /// Target storage location.
        location: String,
        /// Optional target codec.
        codec: Option<CompressionCodec>,
    },
    /// Drop the partition.
    Drop,
    /// Truncate the partition.
    Truncate,
}

impl TransitionTarget {
    /// Returns the action type that reaches this target.
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::Compress { .. } => ActionType::Compress,
            Self::Move { .. } => ActionType::Move,
            Self::Drop => ActionType::Drop,
            Self::Truncate => ActionType::Truncate,
        }
    }

    /// Returns the target codec, when the action sets one.
    #[must_use]
    pub fn codec(&self) -> Option<CompressionCodec> {
        match self {
            Self::Compress { codec } => Some(*codec),
            Self::Move { codec, .. } => *codec,
            Self::Drop | Self::Truncate => None,
        }
    }

    /// Returns the target location, when the action sets one.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Move { location, .. } => Some(location.as_str()),
            Self::Compress { .. } | Self::Drop | Self::Truncate => None,
        }
    }

    /// Returns whether a partition in the given state already matches the target.
    #[must_use]
    pub fn is_satisfied_by(&self, codec: CompressionCodec, location: &str, row_count: i64) -> bool {
        match self {
            Self::Compress { codec: target } => codec == *target,
            Self::Move {
                location: target_location,
                codec: target_codec,
            } => {
                location.eq_ignore_ascii_case(target_location)
                    && target_codec.is_none_or(|target| target == codec)
            }
            Self::Drop => false,
            Self::Truncate => row_count == 0,
        }
    }
}

/// Specific reason a policy write was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyValidationError {
    /// Target object is not registered in the catalog.
    #[error("target object '{0}' does not exist")]
    ObjectNotFound(String),
    /// Target object exists but has no partitions scheme.
    #[error("target object '{0}' is not partitioned")]
    ObjectNotPartitioned(String),
    /// Codec is not in the supported enumeration.
    #[error("compression codec '{0}' is not supported")]
    InvalidCodec(String),
    /// Relocation target location does not exist.
    #[error("storage location '{0}' does not exist")]
    InvalidLocation(String),
    /// Action type is not allowed for the policy type.
    #[error("action '{action}' is not compatible with policy type '{policy_type}'")]
    IncompatibleAction {
        /// Policy type value.
        policy_type: &'static str,
        /// Action type value.
        action: &'static str,
    },
    /// An action-specific parameter is missing.
    #[error("missing required parameter '{0}'")]
    MissingRequiredParameter(&'static str),
    /// No trigger condition is set.
    #[error("policy requires at least one trigger condition")]
    NoTriggerCondition,
    /// A trigger value is outside its accepted range.
    #[error("{field} must be non-negative (got {value})")]
    ConditionOutOfRange {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: i64,
    },
    /// Custom condition is structurally invalid.
    #[error("invalid custom condition: {0}")]
    InvalidCustomCondition(String),
    /// Priority is outside [1, 999].
    #[error("priority must be between {POLICY_PRIORITY_MIN} and {POLICY_PRIORITY_MAX} (got {0})")]
    PriorityOutOfRange(i64),
    /// Referenced threshold profile does not exist.
    #[error("threshold profile '{0}' does not exist")]
    ThresholdProfileNotFound(String),
    /// Another policy already uses the name.
    #[error("policy name '{0}' is already in use")]
    DuplicatePolicyName(String),
}

impl PolicyValidationError {
    /// Returns a stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ObjectNotFound(_) => "object_not_found",
            Self::ObjectNotPartitioned(_) => "object_not_partitioned",
            Self::InvalidCodec(_) => "invalid_codec",
            Self::InvalidLocation(_) => "invalid_location",
            Self::IncompatibleAction { .. } => "incompatible_action",
            Self::MissingRequiredParameter(_) => "missing_required_parameter",
            Self::NoTriggerCondition => "no_trigger_condition",
            Self::ConditionOutOfRange { .. } => "condition_out_of_range",
            Self::InvalidCustomCondition(_) => "invalid_custom_condition",
            Self::PriorityOutOfRange(_) => "priority_out_of_range",
            Self::ThresholdProfileNotFound(_) => "threshold_profile_not_found",
            Self::DuplicatePolicyName(_) => "duplicate_policy_name",
        }
    }
}

impl From<PolicyValidationError> for AppError {
    fn from(error: PolicyValidationError) -> Self {
        let message = format!("{}: {error}", error.code());
        match error {
            PolicyValidationError::DuplicatePolicyName(_) => AppError::Conflict(message),
            _ => AppError::Validation(message),
        }
    }
}

/// Non-fatal observation about an accepted policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAdvisory {
    /// Both age conditions are set; the month-based one is used.
    AgeMonthsOverridesAgeDays,
}

impl PolicyAdvisory {
    /// Returns a human readable description.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::AgeMonthsOverridesAgeDays => {
                "both age_days and age_months are set; age_months takes precedence"
            }
        }
    }
}

/// Raw policy definition as submitted by callers and templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInput {
    /// Unique policy name.
    pub name: String,
    /// Target object owner.
    pub owner: String,
    /// Target object name.
    pub object: String,
    /// Policy category.
    pub policy_type: PolicyType,
    /// Action performed on eligible partitions.
    pub action_type: ActionType,
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
    /// Evaluation priority, lower first.
    pub priority: i64,
    /// Enabled flag.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Optional threshold profile name.
    #[serde(default)]
    pub threshold_profile: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Validated lifecycle policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    id: PolicyId,
    name: NonEmptyString,
    target: ObjectRef,
    policy_type: PolicyType,
    action_type: ActionType,
    trigger: TriggerCondition,
    target_codec: Option<CompressionCodec>,
    target_location: Option<String>,
    priority: u16,
    enabled: bool,
    threshold_profile: Option<String>,
}

impl Policy {
    /// Creates a validated policy from raw input.
    ///
    /// Checks run in order: codec, action compatibility, action parameters,
    /// trigger presence, trigger ranges, custom condition, priority.
    pub fn new(id: PolicyId, input: PolicyInput) -> Result<Self, PolicyValidationError> {
        let PolicyInput {
            name,
            owner,
            object,
            policy_type,
            action_type,
            age_days,
            age_months,
            access_pattern,
            size_threshold_mb,
            custom_condition,
            compression_type,
            target_location,
            priority,
            enabled,
            threshold_profile,
        } = input;

        let name = NonEmptyString::new(name.trim())
            .map_err(|_| PolicyValidationError::MissingRequiredParameter("policy_name"))?;
        let target = ObjectRef::new(owner, object)
            .map_err(|_| PolicyValidationError::MissingRequiredParameter("target_object"))?;

        let target_codec = compression_type
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                value
                    .parse::<CompressionCodec>()
                    .map_err(|_| PolicyValidationError::InvalidCodec(value.clone()))
            })
            .transpose()?;

        if !policy_type.allows(action_type) {
            return Err(PolicyValidationError::IncompatibleAction {
                policy_type: policy_type.as_str(),
                action: action_type.as_str(),
            });
        }

        let target_location = target_location
            .map(|value| value.trim().to_ascii_uppercase())
            .filter(|value| !value.is_empty());

        match action_type {
            ActionType::Compress if target_codec.is_none() => {
                return Err(PolicyValidationError::MissingRequiredParameter(
                    "compression_type",
                ));
            }
            ActionType::Move if target_location.is_none() => {
                return Err(PolicyValidationError::MissingRequiredParameter(
                    "target_location",
                ));
            }
            _ => {}
        }

        let trigger = TriggerCondition {
            age_days: non_negative("age_days", age_days)?,
            age_months: non_negative("age_months", age_months)?,
            access_pattern,
            size_threshold_mb: non_negative("size_threshold_mb", size_threshold_mb)?,
            custom_condition,
        };

        if trigger.is_empty() {
            return Err(PolicyValidationError::NoTriggerCondition);
        }

        if let Some(condition) = &trigger.custom_condition {
            condition
                .validate()
                .map_err(|error| PolicyValidationError::InvalidCustomCondition(error.to_string()))?;
        }

        if !(POLICY_PRIORITY_MIN..=POLICY_PRIORITY_MAX).contains(&priority) {
            return Err(PolicyValidationError::PriorityOutOfRange(priority));
        }
        let priority = u16::try_from(priority)
            .map_err(|_| PolicyValidationError::PriorityOutOfRange(priority))?;

        let threshold_profile = threshold_profile
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        Ok(Self {
            id,
            name,
            target,
            policy_type,
            action_type,
            trigger,
            target_codec,
            target_location,
            priority,
            enabled,
            threshold_profile,
        })
    }

    /// Returns policy identifier.
    #[must_use]
    pub fn id(&self) -> PolicyId {
        self.id
    }

    /// Returns unique policy name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the target object.
    #[must_use]
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    /// Returns policy category.
    #[must_use]
    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    /// Returns action type.
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// Returns trigger conditions.
    #[must_use]
    pub fn trigger(&self) -> &TriggerCondition {
        &self.trigger
    }

    /// Returns target codec.
    #[must_use]
    pub fn target_codec(&self) -> Option<CompressionCodec> {
        self.target_codec
    }

    /// Returns target location.
    #[must_use]
    pub fn target_location(&self) -> Option<&str> {
        self.target_location.as_deref()
    }

    /// Returns evaluation priority.
    #[must_use]
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Returns whether the policy is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the referenced threshold profile name.
    #[must_use]
    pub fn threshold_profile(&self) -> Option<&str> {
        self.threshold_profile.as_deref()
    }

    /// Returns the end state this policy drives partitions to.
    #[must_use]
    pub fn transition_target(&self) -> TransitionTarget {
        match self.action_type {
            ActionType::Compress => TransitionTarget::Compress {
                codec: self.target_codec.unwrap_or(CompressionCodec::None),
            },
            ActionType::Move => TransitionTarget::Move {
                location: self.target_location.clone().unwrap_or_default(),
                codec: self.target_codec,
            },
            ActionType::Drop => TransitionTarget::Drop,
            ActionType::Truncate => TransitionTarget::Truncate,
        }
    }

    /// Returns advisories for an accepted policy.
    #[must_use]
    pub fn advisories(&self) -> Vec<PolicyAdvisory> {
        let mut advisories = Vec::new();
        if self.trigger.age_days.is_some() && self.trigger.age_months.is_some() {
            advisories.push(PolicyAdvisory::AgeMonthsOverridesAgeDays);
        }

        advisories
    }

    /// Returns a copy with the enabled flag changed.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the raw definition this policy was built from.
    #[must_use]
    pub fn to_input(&self) -> PolicyInput {
        PolicyInput {
            name: self.name.as_str().to_owned(),
            owner: self.target.owner().to_owned(),
            object: self.target.name().to_owned(),
            policy_type: self.policy_type,
            action_type: self.action_type,
            age_days: self.trigger.age_days.map(i64::from),
            age_months: self.trigger.age_months.map(i64::from),
            access_pattern: self.trigger.access_pattern,
            size_threshold_mb: self
                .trigger
                .size_threshold_mb
                .and_then(|value| i64::try_from(value).ok()),
            custom_condition: self.trigger.custom_condition.clone(),
            compression_type: self.target_codec.map(|codec| codec.as_str().to_owned()),
            target_location: self.target_location.clone(),
            priority: i64::from(self.priority),
            enabled: self.enabled,
            threshold_profile: self.threshold_profile.clone(),
        }
    }
}

fn non_negative<T: TryFrom<i64>>(
    field: &'static str,
    value: Option<i64>,
) -> Result<Option<T>, PolicyValidationError> {
    value
        .map(|value| {
            if value < 0 {
                return Err(PolicyValidationError::ConditionOutOfRange { field, value });
            }

            T::try_from(value).map_err(|_| PolicyValidationError::ConditionOutOfRange { field, value })
        })
        .transpose()
}
