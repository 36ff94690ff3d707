//! Domain entities and invariants for partition lifecycle management.

#![forbid(unsafe_code)]

mod boundary;
mod condition;
mod object;
mod partition;
mod partition_name;
mod policy;
mod settings;
mod template;
mod tier;

pub use boundary::{PartitionBoundary, TierConfig, TierDefinition, build_boundaries};
pub use condition::{ComparisonOperator, ConditionExpr, PartitionFacts, PartitionMetric};
pub use object::{ObjectRef, PartitionKey};
pub use partition::{
    EstimateSource, HeatStatistics, PartitionAccessRecord, PartitionSnapshot,
    whole_months_between,
};
pub use partition_name::{FinePartitionName, PARTITION_NAME_PREFIX, partition_name};
pub use policy::{
    ActionType, AgeRule, POLICY_PRIORITY_MAX, POLICY_PRIORITY_MIN, Policy, PolicyAdvisory,
    PolicyId, PolicyInput, PolicyType, PolicyValidationError, TransitionTarget, TriggerCondition,
};
pub use settings::LifecycleSettings;
pub use template::{PolicyTemplate, PolicyTemplateDocument, TemplatePolicyEntry};
pub use tier::{CompressionCodec, Granularity, Temperature, ThresholdProfile, Thresholds};
