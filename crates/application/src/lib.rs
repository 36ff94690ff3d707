//! Lifecycle application services and ports.

#![forbid(unsafe_code)]

mod evaluation_service;
mod execution_service;
mod lifecycle_ports;
mod merge_service;
mod policy_service;
mod reporting_service;
mod scheduler_service;
mod threshold_resolver;
mod tracking_service;

#[cfg(test)]
mod test_support;

pub use evaluation_service::{EvaluationService, EvaluationSummary};
pub use execution_service::{ExecutionReport, ExecutionService, PlannedAction};
pub use lifecycle_ports::{
    AccessRecordRepository, AuditLogQuery, EvaluationQueueEntry, EvaluationQueueRepository,
    ExecutionLogEntry, ExecutionLogRepository, ExecutionScope, ExecutionStatus, LockLease,
    MergeDestination, MergeLogRepository, MergeStatus, ObjectDescriptor, PartitionCatalog,
    PartitionLockCoordinator, PartitionMergeRecord, PolicyRepository, QueueEntryUpsert,
    QueueMergeOutcome, QueueStatus, SettingsRepository, TaskRun, TaskRunRepository,
    TaskRunStatus, object_lock_key, partition_lock_key, refresh_lock_key,
};
pub use merge_service::MergeService;
pub use policy_service::{PolicyService, PolicyWriteResult, TemplateSource};
pub use reporting_service::{
    ExecutionSummary, MergeSummary, PolicyEffectiveness, ReportingService, policy_effectiveness,
    summarize_executions, summarize_merges,
};
pub use scheduler_service::{
    CycleReport, EVALUATE_TASK, EXECUTE_TASK, REFRESH_TASK, SchedulerService,
};
pub use threshold_resolver::ThresholdResolver;
pub use tracking_service::{RefreshSummary, TrackingService};
