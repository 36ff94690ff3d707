mod catalog;
mod lock;
mod records;
mod repository;

pub use catalog::{MergeDestination, ObjectDescriptor, PartitionCatalog};
pub use lock::{
    LockLease, PartitionLockCoordinator, object_lock_key, partition_lock_key, refresh_lock_key,
};
pub use records::{
    AuditLogQuery, EvaluationQueueEntry, ExecutionLogEntry, ExecutionScope, ExecutionStatus,
    MergeStatus, PartitionMergeRecord, QueueEntryUpsert, QueueMergeOutcome, QueueStatus, TaskRun,
    TaskRunStatus,
};
pub use repository::{
    AccessRecordRepository, EvaluationQueueRepository, ExecutionLogRepository,
    MergeLogRepository, PolicyRepository, SettingsRepository, TaskRunRepository,
};
