use async_trait::async_trait;
use chrono::{DateTime, Utc};
use strata_core::AppResult;
use strata_domain::{
    LifecycleSettings, ObjectRef, PartitionAccessRecord, PartitionKey, Policy, PolicyId,
    PolicyTemplate, ThresholdProfile,
};

use super::records::{
    AuditLogQuery, EvaluationQueueEntry, ExecutionLogEntry, ExecutionScope, PartitionMergeRecord,
    QueueEntryUpsert, QueueMergeOutcome, TaskRun,
};

/// Repository port for policies, threshold profiles and policy templates.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Inserts one policy; fails with a conflict when the name is taken.
    async fn create_policy(&self, policy: Policy) -> AppResult<()>;

    /// Inserts several policies atomically.
    async fn create_policies(&self, policies: Vec<Policy>) -> AppResult<()>;

    /// Replaces one existing policy.
    async fn update_policy(&self, policy: Policy) -> AppResult<()>;

    /// Deletes one policy.
    async fn delete_policy(&self, policy_id: PolicyId) -> AppResult<()>;

    /// Returns one policy by id.
    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<Option<Policy>>;

    /// Returns one policy by unique name.
    async fn find_policy_by_name(&self, name: &str) -> AppResult<Option<Policy>>;

    /// Lists all policies ordered by priority then name.
    async fn list_policies(&self) -> AppResult<Vec<Policy>>;

    /// Lists enabled policies ordered by priority then name.
    async fn list_enabled_policies(&self) -> AppResult<Vec<Policy>>;

    /// Inserts or replaces one threshold profile.
    async fn save_profile(&self, profile: ThresholdProfile) -> AppResult<()>;

    /// Returns one threshold profile by name.
    async fn find_profile(&self, name: &str) -> AppResult<Option<ThresholdProfile>>;

    /// Lists threshold profiles.
    async fn list_profiles(&self) -> AppResult<Vec<ThresholdProfile>>;

    /// Deletes one threshold profile; fails with a conflict while referenced.
    async fn delete_profile(&self, name: &str) -> AppResult<()>;

    /// Inserts or replaces one policy template.
    async fn save_template(&self, template: PolicyTemplate) -> AppResult<()>;

    /// Returns one policy template by name.
    async fn find_template(&self, name: &str) -> AppResult<Option<PolicyTemplate>>;

    /// Lists policy templates.
    async fn list_templates(&self) -> AppResult<Vec<PolicyTemplate>>;

    /// Deletes one policy template.
    async fn delete_template(&self, name: &str) -> AppResult<()>;
}

/// Repository port for per-partition access records.
#[async_trait]
pub trait AccessRecordRepository: Send + Sync {
    /// Inserts or replaces one record by natural key.
    async fn upsert_record(&self, record: PartitionAccessRecord) -> AppResult<()>;

    /// Returns one record.
    async fn find_record(&self, key: &PartitionKey) -> AppResult<Option<PartitionAccessRecord>>;

    /// Lists records of one object.
    async fn list_records(&self, object: &ObjectRef) -> AppResult<Vec<PartitionAccessRecord>>;

    /// Deletes one record.
    async fn delete_record(&self, key: &PartitionKey) -> AppResult<()>;
}

/// Repository port for the evaluation queue.
///
/// Every status change is a compare-and-swap; an EXECUTING entry is only
/// changed by the run that claimed it.
#[async_trait]
pub trait EvaluationQueueRepository: Send + Sync {
    /// Merges one eligible entry as PENDING, keeping attempts and last error.
    async fn merge_entry(&self, entry: QueueEntryUpsert) -> AppResult<QueueMergeOutcome>;

    /// Turns an existing non-executing entry into an ineligible SKIPPED marker.
    ///
    /// Returns whether an entry was changed.
    async fn mark_ineligible(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        reason: &str,
    ) -> AppResult<bool>;

    /// Returns one entry.
    async fn find_entry(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
    ) -> AppResult<Option<EvaluationQueueEntry>>;

    /// Lists eligible PENDING or FAILED entries ordered by priority then queue time.
    async fn list_runnable(&self, scope: &ExecutionScope) -> AppResult<Vec<EvaluationQueueEntry>>;

    /// Lists entries, optionally for one policy.
    async fn list_entries(&self, policy_id: Option<PolicyId>)
    -> AppResult<Vec<EvaluationQueueEntry>>;

    /// Moves one entry from PENDING or FAILED to EXECUTING; false when the swap lost.
    async fn claim_entry(&self, policy_id: PolicyId, key: &PartitionKey) -> AppResult<bool>;

    /// Consumes one executing entry after success.
    async fn complete_entry(&self, policy_id: PolicyId, key: &PartitionKey) -> AppResult<()>;

    /// Marks one executing entry FAILED and increments its attempts.
    async fn fail_entry(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        error_message: &str,
    ) -> AppResult<()>;

    /// Returns EXECUTING entries last claimed before `claimed_before` to FAILED.
    ///
    /// Their claim outlived the partition lease, so the holder is gone. Returns
    /// the number of released entries.
    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> AppResult<u64>;

    /// Deletes every entry of one partition.
    async fn delete_partition_entries(&self, key: &PartitionKey) -> AppResult<u64>;

    /// Deletes every entry of one policy.
    async fn delete_policy_entries(&self, policy_id: PolicyId) -> AppResult<u64>;
}

/// Append-only repository port for execution attempts.
#[async_trait]
pub trait ExecutionLogRepository: Send + Sync {
    /// Appends one execution log row.
    async fn append_execution(&self, entry: ExecutionLogEntry) -> AppResult<()>;

    /// Lists execution rows newest first.
    async fn list_executions(&self, query: AuditLogQuery) -> AppResult<Vec<ExecutionLogEntry>>;
}

/// Append-only repository port for merge attempts.
#[async_trait]
pub trait MergeLogRepository: Send + Sync {
    /// Appends one merge record.
    async fn append_merge(&self, record: PartitionMergeRecord) -> AppResult<()>;

    /// Lists merge records newest first.
    async fn list_merges(&self, query: AuditLogQuery) -> AppResult<Vec<PartitionMergeRecord>>;
}

/// Repository port for the durable lifecycle settings row.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Loads the current settings snapshot.
    async fn load_settings(&self) -> AppResult<LifecycleSettings>;

    /// Replaces the settings row.
    async fn save_settings(&self, settings: LifecycleSettings) -> AppResult<()>;

    /// Reads the current emergency stop flag without loading a full snapshot.
    async fn is_emergency_stopped(&self) -> AppResult<bool>;
}

/// Repository port for background task last-run status.
#[async_trait]
pub trait TaskRunRepository: Send + Sync {
    /// Inserts or replaces the last run of one task.
    async fn save_task_run(&self, run: TaskRun) -> AppResult<()>;

    /// Lists the last run of every task.
    async fn list_task_runs(&self) -> AppResult<Vec<TaskRun>>;
}
