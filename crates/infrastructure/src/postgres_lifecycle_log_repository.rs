use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use strata_application::{
    AuditLogQuery, ExecutionLogEntry, ExecutionLogRepository, ExecutionStatus, MergeLogRepository,
    MergeStatus, PartitionMergeRecord,
};
use strata_core::{AppError, AppResult};
use strata_domain::{ActionType, ObjectRef, PartitionKey, PolicyId};
use uuid::Uuid;

const DEFAULT_LIST_LIMIT: usize = 200;
const MAX_LIST_LIMIT: usize = 1_000;

/// PostgreSQL-backed append-only execution and merge logs.
#[derive(Clone)]
pub struct PostgresLifecycleLogRepository {
    pool: PgPool,
}

impl PostgresLifecycleLogRepository {
    /// Creates a log repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ExecutionLogRow {
    run_id: Uuid,
    policy_id: Uuid,
    policy_name: String,
    owner: String,
    object_name: String,
    partition_name: String,
    action_type: String,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration_ms: i64,
    size_before_bytes: Option<i64>,
    size_after_bytes: Option<i64>,
    compression_ratio: Option<f64>,
    error_kind: Option<String>,
    error_detail: Option<String>,
}

#[derive(Debug, FromRow)]
struct MergeLogRow {
    owner: String,
    object_name: String,
    source_partition: String,
    target_partition: Option<String>,
    status: String,
    reason: Option<String>,
    duration_ms: i64,
    rows_merged: i64,
    attempted_at: DateTime<Utc>,
}

#[async_trait]
impl ExecutionLogRepository for PostgresLifecycleLogRepository {
    async fn append_execution(&self, entry: ExecutionLogEntry) -> AppResult<()> {
        let object = entry.key.object();

        sqlx::query(
            r#"
            INSERT INTO ilm_execution_log (
                run_id,
                policy_id,
                policy_name,
                owner,
                object_name,
                partition_name,
                action_type,
                status,
                started_at,
                finished_at,
                duration_ms,
                size_before_bytes,
                size_after_bytes,
                compression_ratio,
                error_kind,
                error_detail
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(entry.run_id)
        .bind(entry.policy_id.as_uuid())
        .bind(entry.policy_name.as_str())
        .bind(object.owner())
        .bind(object.name())
        .bind(entry.key.partition())
        .bind(entry.action.as_str())
        .bind(entry.status.as_str())
        .bind(entry.started_at)
        .bind(entry.finished_at)
        .bind(entry.duration_ms)
        .bind(entry.size_before_bytes)
        .bind(entry.size_after_bytes)
        .bind(entry.compression_ratio)
        .bind(entry.error_kind.as_deref())
        .bind(entry.error_detail.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append execution log entry: {error}"))
        })?;

        Ok(())
    }

    async fn list_executions(&self, query: AuditLogQuery) -> AppResult<Vec<ExecutionLogEntry>> {
        let (owner, object_name) = object_filter(query.object.as_ref());

        let rows = sqlx::query_as::<_, ExecutionLogRow>(
            r#"
            SELECT
                run_id,
                policy_id,
                policy_name,
                owner,
                object_name,
                partition_name,
                action_type,
                status,
                started_at,
                finished_at,
                duration_ms,
                size_before_bytes,
                size_after_bytes,
                compression_ratio,
                error_kind,
                error_detail
            FROM ilm_execution_log
            WHERE ($1::TEXT IS NULL OR owner = $1)
              AND ($2::TEXT IS NULL OR object_name = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR started_at >= $3)
            ORDER BY started_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(owner)
        .bind(object_name)
        .bind(query.since)
        .bind(list_limit(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list execution log: {error}")))?;

        rows.into_iter().map(execution_from_row).collect()
    }
}

#[async_trait]
impl MergeLogRepository for PostgresLifecycleLogRepository {
    async fn append_merge(&self, record: PartitionMergeRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ilm_partition_merge_log (
                owner,
                object_name,
                source_partition,
                target_partition,
                status,
                reason,
                duration_ms,
                rows_merged,
                attempted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.object.owner())
        .bind(record.object.name())
        .bind(record.source_partition.as_str())
        .bind(record.target_partition.as_deref())
        .bind(record.status.as_str())
        .bind(record.reason.as_deref())
        .bind(record.duration_ms)
        .bind(record.rows_merged)
        .bind(record.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append merge record: {error}")))?;

        Ok(())
    }

    async fn list_merges(&self, query: AuditLogQuery) -> AppResult<Vec<PartitionMergeRecord>> {
        let (owner, object_name) = object_filter(query.object.as_ref());

        let rows = sqlx::query_as::<_, MergeLogRow>(
            r#"
            SELECT
                owner,
                object_name,
                source_partition,
                target_partition,
                status,
                reason,
                duration_ms,
                rows_merged,
                attempted_at
            FROM ilm_partition_merge_log
            WHERE ($1::TEXT IS NULL OR owner = $1)
              AND ($2::TEXT IS NULL OR object_name = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR attempted_at >= $3)
            ORDER BY attempted_at DESC, id DESC
            LIMIT $4
            "#,
        )
        .bind(owner)
        .bind(object_name)
        .bind(query.since)
        .bind(list_limit(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list merge log: {error}")))?;

        rows.into_iter().map(merge_from_row).collect()
    }
}

fn object_filter(object: Option<&ObjectRef>) -> (Option<&str>, Option<&str>) {
    object.map_or((None, None), |object| {
        (Some(object.owner()), Some(object.name()))
    })
}

fn list_limit(limit: Option<usize>) -> i64 {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    i64::try_from(limit).unwrap_or(1_000)
}

fn execution_from_row(row: ExecutionLogRow) -> AppResult<ExecutionLogEntry> {
    Ok(ExecutionLogEntry {
        run_id: row.run_id,
        policy_id: PolicyId::from_uuid(row.policy_id),
        policy_name: row.policy_name,
        key: PartitionKey::new(row.owner, row.object_name, row.partition_name)?,
        action: row.action_type.parse::<ActionType>()?,
        status: ExecutionStatus::parse(row.status.as_str())?,
        started_at: row.started_at,
        finished_at: row.finished_at,
        duration_ms: row.duration_ms,
        size_before_bytes: row.size_before_bytes,
        size_after_bytes: row.size_after_bytes,
        compression_ratio: row.compression_ratio,
        error_kind: row.error_kind,
        error_detail: row.error_detail,
    })
}

fn merge_from_row(row: MergeLogRow) -> AppResult<PartitionMergeRecord> {
    Ok(PartitionMergeRecord {
        object: ObjectRef::new(row.owner, row.object_name)?,
        source_partition: row.source_partition,
        target_partition: row.target_partition,
        status: MergeStatus::parse(row.status.as_str())?,
        reason: row.reason,
        duration_ms: row.duration_ms,
        rows_merged: row.rows_merged,
        attempted_at: row.attempted_at,
    })
}
