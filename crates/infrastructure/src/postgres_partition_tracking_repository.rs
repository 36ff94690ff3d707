use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use strata_application::{
    AccessRecordRepository, EvaluationQueueEntry, EvaluationQueueRepository, ExecutionScope,
    QueueEntryUpsert, QueueMergeOutcome, QueueStatus,
};
use strata_core::{AppError, AppResult};
use strata_domain::{
    ActionType, CompressionCodec, EstimateSource, ObjectRef, PartitionAccessRecord, PartitionKey,
    PolicyId, Temperature, TransitionTarget,
};
use tracing::warn;
use uuid::Uuid;

mod access;
mod queue;

/// PostgreSQL-backed repository for access records and the evaluation queue.
#[derive(Clone)]
pub struct PostgresPartitionTrackingRepository {
    pool: PgPool,
}

impl PostgresPartitionTrackingRepository {
    /// Creates a tracking repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccessRecordRow {
    owner: String,
    object_name: String,
    partition_name: String,
    last_write_at: DateTime<Utc>,
    last_read_at: Option<DateTime<Utc>>,
    read_count: i64,
    write_count: i64,
    heat_observations: i64,
    row_count: i64,
    size_bytes: i64,
    codec: String,
    location: String,
    age_days: i64,
    temperature: String,
    estimate_source: String,
    refreshed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct QueueEntryRow {
    policy_id: Uuid,
    owner: String,
    object_name: String,
    partition_name: String,
    policy_name: String,
    eligible: bool,
    action_type: String,
    target_codec: Option<String>,
    target_location: Option<String>,
    priority: i32,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    queued_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl AccessRecordRepository for PostgresPartitionTrackingRepository {
    async fn upsert_record(&self, record: PartitionAccessRecord) -> AppResult<()> {
        self.upsert_record_impl(record).await
    }

    async fn find_record(&self, key: &PartitionKey) -> AppResult<Option<PartitionAccessRecord>> {
        self.find_record_impl(key).await
    }

    async fn list_records(&self, object: &ObjectRef) -> AppResult<Vec<PartitionAccessRecord>> {
        self.list_records_impl(object).await
    }

    async fn delete_record(&self, key: &PartitionKey) -> AppResult<()> {
        self.delete_record_impl(key).await
    }
}

#[async_trait]
impl EvaluationQueueRepository for PostgresPartitionTrackingRepository {
    async fn merge_entry(&self, entry: QueueEntryUpsert) -> AppResult<QueueMergeOutcome> {
        self.merge_entry_impl(entry).await
    }

    async fn mark_ineligible(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        reason: &str,
    ) -> AppResult<bool> {
        self.mark_ineligible_impl(policy_id, key, reason).await
    }

    async fn find_entry(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
    ) -> AppResult<Option<EvaluationQueueEntry>> {
        self.find_entry_impl(policy_id, key).await
    }

    async fn list_runnable(&self, scope: &ExecutionScope) -> AppResult<Vec<EvaluationQueueEntry>> {
        self.list_runnable_impl(scope).await
    }

    async fn list_entries(
        &self,
        policy_id: Option<PolicyId>,
    ) -> AppResult<Vec<EvaluationQueueEntry>> {
        self.list_entries_impl(policy_id).await
    }

    async fn claim_entry(&self, policy_id: PolicyId, key: &PartitionKey) -> AppResult<bool> {
        self.claim_entry_impl(policy_id, key).await
    }

    async fn complete_entry(&self, policy_id: PolicyId, key: &PartitionKey) -> AppResult<()> {
        self.complete_entry_impl(policy_id, key).await
    }

    async fn fail_entry(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        error_message: &str,
    ) -> AppResult<()> {
        self.fail_entry_impl(policy_id, key, error_message).await
    }

    async fn release_stale_claims(&self, claimed_before: DateTime<Utc>) -> AppResult<u64> {
        self.release_stale_claims_impl(claimed_before).await
    }

    async fn delete_partition_entries(&self, key: &PartitionKey) -> AppResult<u64> {
        self.delete_partition_entries_impl(key).await
    }

    async fn delete_policy_entries(&self, policy_id: PolicyId) -> AppResult<u64> {
        self.delete_policy_entries_impl(policy_id).await
    }
}

fn access_record_from_row(row: AccessRecordRow) -> AppResult<PartitionAccessRecord> {
    Ok(PartitionAccessRecord {
        key: PartitionKey::new(row.owner, row.object_name, row.partition_name)?,
        last_write_at: row.last_write_at,
        last_read_at: row.last_read_at,
        read_count: row.read_count,
        write_count: row.write_count,
        heat_observations: row.heat_observations,
        row_count: row.row_count,
        size_bytes: row.size_bytes,
        codec: row.codec.parse::<CompressionCodec>()?,
        location: row.location,
        age_days: row.age_days,
        temperature: row.temperature.parse::<Temperature>()?,
        estimate_source: row.estimate_source.parse::<EstimateSource>()?,
        refreshed_at: row.refreshed_at,
    })
}

fn queue_entry_from_row(row: QueueEntryRow) -> AppResult<EvaluationQueueEntry> {
    let target = transition_target_from_parts(
        row.action_type.as_str(),
        row.target_codec.as_deref(),
        row.target_location,
    )?;
    let priority = u16::try_from(row.priority).map_err(|_| {
        AppError::Internal(format!("stored queue priority '{}' is invalid", row.priority))
    })?;

    Ok(EvaluationQueueEntry {
        policy_id: PolicyId::from_uuid(row.policy_id),
        policy_name: row.policy_name,
        key: PartitionKey::new(row.owner, row.object_name, row.partition_name)?,
        eligible: row.eligible,
        target,
        priority,
        status: QueueStatus::parse(row.status.as_str())?,
        attempts: row.attempts,
        last_error: row.last_error,
        queued_at: row.queued_at,
        updated_at: row.updated_at,
    })
}

fn transition_target_parts(target: &TransitionTarget) -> (&'static str, Option<&'static str>, Option<&str>) {
    (
        target.action_type().as_str(),
        target.codec().map(|codec| codec.as_str()),
        target.location(),
    )
}

fn transition_target_from_parts(
    action_type: &str,
    codec: Option<&str>,
    location: Option<String>,
) -> AppResult<TransitionTarget> {
    let codec = codec.map(str::parse::<CompressionCodec>).transpose()?;

    match action_type.parse::<ActionType>()? {
        ActionType::Compress => codec
            .map(|codec| TransitionTarget::Compress { codec })
            .ok_or_else(|| {
                AppError::Internal("stored COMPRESS queue entry has no target codec".to_owned())
            }),
        ActionType::Move => location
            .map(|location| TransitionTarget::Move { location, codec })
            .ok_or_else(|| {
                AppError::Internal("stored MOVE queue entry has no target location".to_owned())
            }),
        ActionType::Drop => Ok(TransitionTarget::Drop),
        ActionType::Truncate => Ok(TransitionTarget::Truncate),
    }
}

#[cfg(test)]
mod tests;
