use chrono::{DateTime, Utc};
use serde::Serialize;
use strata_core::{AppError, AppResult};
use strata_domain::{ActionType, ObjectRef, PartitionKey, PolicyId, TransitionTarget};
use uuid::Uuid;

/// Lifecycle status of one evaluation queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Waiting for execution.
    Pending,
    /// Claimed by an execution run.
    Executing,
    /// Executed successfully.
    Success,
    /// Last attempt failed; retry-eligible.
    Failed,
    /// Ineligible marker; not runnable.
    Skipped,
}

impl QueueStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executing => "EXECUTING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "EXECUTING" => Ok(Self::Executing),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(AppError::Validation(format!(
                "unknown queue status '{value}'"
            ))),
        }
    }

    /// Returns whether an execution run may claim an entry in this status.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

/// Pending action for one (policy, partition) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationQueueEntry {
    /// Owning policy.
    pub policy_id: PolicyId,
    /// Policy name at evaluation time.
    pub policy_name: String,
    /// Target partition.
    pub key: PartitionKey,
    /// Whether the partition met the policy's conditions at last evaluation.
    pub eligible: bool,
    /// Desired end state.
    pub target: TransitionTarget,
    /// Policy priority, lower first.
    pub priority: u16,
    /// Queue status.
    pub status: QueueStatus,
    /// Failed execution attempts.
    pub attempts: i32,
    /// Last execution error.
    pub last_error: Option<String>,
    /// First queue time.
    pub queued_at: DateTime<Utc>,
    /// Last change time.
    pub updated_at: DateTime<Utc>,
}

impl EvaluationQueueEntry {
    /// Returns the recommended action.
    #[must_use]
    pub fn action(&self) -> ActionType {
        self.target.action_type()
    }

    /// Returns whether an execution run may pick this entry.
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.eligible && self.status.is_runnable()
    }
}

/// Eligible queue entry produced by one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntryUpsert {
    /// Owning policy.
    pub policy_id: PolicyId,
    /// Policy name.
    pub policy_name: String,
    /// Target partition.
    pub key: PartitionKey,
    /// Desired end state.
    pub target: TransitionTarget,
    /// Policy priority.
    pub priority: u16,
}

/// Result of merging one eligible entry into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMergeOutcome {
    /// No entry existed; a PENDING entry was created.
    Inserted,
    /// An existing non-executing entry was reset to PENDING.
    Updated,
    /// The existing entry is executing and was left untouched.
    SkippedExecuting,
}

/// Subset of queue entries an execution run drains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionScope {
    /// Every runnable entry.
    All,
    /// Entries targeting one object.
    Object(ObjectRef),
    /// Entries owned by one policy.
    Policy(PolicyId),
}

impl ExecutionScope {
    /// Returns whether an entry falls inside the scope.
    #[must_use]
    pub fn includes(&self, entry: &EvaluationQueueEntry) -> bool {
        match self {
            Self::All => true,
            Self::Object(object) => entry.key.object() == object,
            Self::Policy(policy_id) => entry.policy_id == *policy_id,
        }
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Action completed.
    Success,
    /// Action failed or could not start.
    Failed,
}

impl ExecutionStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown execution status '{value}'"
            ))),
        }
    }
}

/// Append-only audit row for one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionLogEntry {
    /// Execution run identifier.
    pub run_id: Uuid,
    /// Policy that queued the action.
    pub policy_id: PolicyId,
    /// Policy name.
    pub policy_name: String,
    /// Target partition.
    pub key: PartitionKey,
    /// Attempted action.
    pub action: ActionType,
    /// Attempt outcome.
    pub status: ExecutionStatus,
    /// Attempt start.
    pub started_at: DateTime<Utc>,
    /// Attempt end.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: i64,
    /// Segment size before the action.
    pub size_before_bytes: Option<i64>,
    /// Segment size after the action.
    pub size_after_bytes: Option<i64>,
    /// `size_before / size_after` when both are known.
    pub compression_ratio: Option<f64>,
    /// Stable error category.
    pub error_kind: Option<String>,
    /// Verbatim error detail.
    pub error_detail: Option<String>,
}

/// Outcome of one merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStatus {
    /// Source folded into its coarse sibling.
    Success,
    /// Lock or catalog failure.
    Failed,
    /// A precondition did not hold.
    Skipped,
}

impl MergeStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(AppError::Validation(format!(
                "unknown merge status '{value}'"
            ))),
        }
    }
}

/// Append-only audit row for one merge attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionMergeRecord {
    /// Owning object.
    pub object: ObjectRef,
    /// Fine partition that was to be folded.
    pub source_partition: String,
    /// Coarse destination, when it could be determined.
    pub target_partition: Option<String>,
    /// Attempt outcome.
    pub status: MergeStatus,
    /// Skip or failure reason.
    pub reason: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: i64,
    /// Rows moved into the destination.
    pub rows_merged: i64,
    /// Attempt time.
    pub attempted_at: DateTime<Utc>,
}

/// Filter applied to audit log listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Restricts rows to one object.
    pub object: Option<ObjectRef>,
    /// Restricts rows to attempts at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Maximum rows returned, newest first.
    pub limit: Option<usize>,
}

/// Status of the last run of one background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunStatus {
    /// Task is running.
    Running,
    /// Task completed.
    Succeeded,
    /// Task returned an error.
    Failed,
    /// Task did not run because execution is halted.
    Halted,
}

impl TaskRunStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Halted => "halted",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "halted" => Ok(Self::Halted),
            _ => Err(AppError::Validation(format!(
                "unknown task run status '{value}'"
            ))),
        }
    }
}

/// Last-run record of one named background task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRun {
    /// Task name.
    pub task_name: String,
    /// Run status.
    pub status: TaskRunStatus,
    /// Human readable outcome.
    pub detail: Option<String>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: Option<DateTime<Utc>>,
}
