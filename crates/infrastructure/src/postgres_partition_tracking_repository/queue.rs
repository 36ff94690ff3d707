use super::*;

const QUEUE_COLUMNS: &str = r#"
    policy_id,
    owner,
    object_name,
    partition_name,
    policy_name,
    eligible,
    action_type,
    target_codec,
    target_location,
    priority,
    status,
    attempts,
    last_error,
    queued_at,
    updated_at
"#;

impl PostgresPartitionTrackingRepository {
    pub(super) async fn merge_entry_impl(
        &self,
        entry: QueueEntryUpsert,
    ) -> AppResult<QueueMergeOutcome> {
        let (action_type, target_codec, target_location) = transition_target_parts(&entry.target);
        let object = entry.key.object();

        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO ilm_evaluation_queue (
                policy_id,
                owner,
                object_name,
                partition_name,
                policy_name,
                eligible,
                action_type,
                target_codec,
                target_location,
                priority,
                status,
                attempts,
                last_error,
                queued_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $8, $9, 'PENDING', 0, NULL, now(), now())
            ON CONFLICT (policy_id, owner, object_name, partition_name) DO UPDATE
            SET policy_name = EXCLUDED.policy_name,
                eligible = TRUE,
                action_type = EXCLUDED.action_type,
                target_codec = EXCLUDED.target_codec,
                target_location = EXCLUDED.target_location,
                priority = EXCLUDED.priority,
                status = 'PENDING',
                updated_at = now()
            WHERE ilm_evaluation_queue.status <> 'EXECUTING'
            RETURNING (xmax = 0)
            "#,
        )
        .bind(entry.policy_id.as_uuid())
        .bind(object.owner())
        .bind(object.name())
        .bind(entry.key.partition())
        .bind(entry.policy_name.as_str())
        .bind(action_type)
        .bind(target_codec)
        .bind(target_location)
        .bind(i32::from(entry.priority))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to merge queue entry for '{}': {error}",
                entry.key
            ))
        })?;

        Ok(match inserted {
            Some(true) => QueueMergeOutcome::Inserted,
            Some(false) => QueueMergeOutcome::Updated,
            None => QueueMergeOutcome::SkippedExecuting,
        })
    }

    pub(super) async fn mark_ineligible_impl(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        reason: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ilm_evaluation_queue
            SET eligible = FALSE,
                status = 'SKIPPED',
                last_error = $5,
                updated_at = now()
            WHERE policy_id = $1
              AND owner = $2
              AND object_name = $3
              AND partition_name = $4
              AND status <> 'EXECUTING'
              AND (eligible OR status <> 'SKIPPED')
            "#,
        )
        .bind(policy_id.as_uuid())
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to mark queue entry ineligible: {error}"))
        })?;

        Ok(result.rows_affected() > 0)
    }

    pub(super) async fn find_entry_impl(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
    ) -> AppResult<Option<EvaluationQueueEntry>> {
        let row = sqlx::query_as::<_, QueueEntryRow>(&format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM ilm_evaluation_queue
            WHERE policy_id = $1 AND owner = $2 AND object_name = $3 AND partition_name = $4
            "#
        ))
        .bind(policy_id.as_uuid())
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find queue entry: {error}")))?;

        row.map(queue_entry_from_row).transpose()
    }

    pub(super) async fn list_runnable_impl(
        &self,
        scope: &ExecutionScope,
    ) -> AppResult<Vec<EvaluationQueueEntry>> {
        let (owner, object_name, policy_id) = match scope {
            ExecutionScope::All => (None, None, None),
            ExecutionScope::Object(object) => (Some(object.owner()), Some(object.name()), None),
            ExecutionScope::Policy(policy_id) => (None, None, Some(policy_id.as_uuid())),
        };

        let rows = sqlx::query_as::<_, QueueEntryRow>(&format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM ilm_evaluation_queue
            WHERE eligible
              AND status IN ('PENDING', 'FAILED')
              AND ($1::TEXT IS NULL OR owner = $1)
              AND ($2::TEXT IS NULL OR object_name = $2)
              AND ($3::UUID IS NULL OR policy_id = $3)
            ORDER BY priority, queued_at, owner, object_name, partition_name
            "#
        ))
        .bind(owner)
        .bind(object_name)
        .bind(policy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list runnable queue entries: {error}"))
        })?;

        rows.into_iter().map(queue_entry_from_row).collect()
    }

    pub(super) async fn list_entries_impl(
        &self,
        policy_id: Option<PolicyId>,
    ) -> AppResult<Vec<EvaluationQueueEntry>> {
        let rows = sqlx::query_as::<_, QueueEntryRow>(&format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM ilm_evaluation_queue
            WHERE ($1::UUID IS NULL OR policy_id = $1)
            ORDER BY priority, queued_at, owner, object_name, partition_name
            "#
        ))
        .bind(policy_id.map(|policy_id| policy_id.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list queue entries: {error}")))?;

        rows.into_iter().map(queue_entry_from_row).collect()
    }

    pub(super) async fn claim_entry_impl(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ilm_evaluation_queue
            SET status = 'EXECUTING',
                updated_at = now()
            WHERE policy_id = $1
              AND owner = $2
              AND object_name = $3
              AND partition_name = $4
              AND eligible
              AND status IN ('PENDING', 'FAILED')
            "#,
        )
        .bind(policy_id.as_uuid())
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to claim queue entry: {error}")))?;

        Ok(result.rows_affected() == 1)
    }

    pub(super) async fn complete_entry_impl(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM ilm_evaluation_queue
            WHERE policy_id = $1
              AND owner = $2
              AND object_name = $3
              AND partition_name = $4
              AND status = 'EXECUTING'
            "#,
        )
        .bind(policy_id.as_uuid())
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to complete queue entry: {error}")))?;

        if result.rows_affected() == 0 {
            warn!(partition = %key, policy_id = %policy_id, "completed queue entry was no longer executing");
        }

        Ok(())
    }

    pub(super) async fn fail_entry_impl(
        &self,
        policy_id: PolicyId,
        key: &PartitionKey,
        error_message: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE ilm_evaluation_queue
            SET status = 'FAILED',
                attempts = attempts + 1,
                last_error = $5,
                updated_at = now()
            WHERE policy_id = $1
              AND owner = $2
              AND object_name = $3
              AND partition_name = $4
              AND status = 'EXECUTING'
            "#,
        )
        .bind(policy_id.as_uuid())
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to fail queue entry: {error}")))?;

        if result.rows_affected() == 0 {
            warn!(partition = %key, policy_id = %policy_id, "failed queue entry was no longer executing");
        }

        Ok(())
    }

    pub(super) async fn release_stale_claims_impl(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ilm_evaluation_queue
            SET status = 'FAILED',
                attempts = attempts + 1,
                last_error = 'execution claim expired before completion',
                updated_at = now()
            WHERE status = 'EXECUTING'
              AND updated_at < $1
            "#,
        )
        .bind(claimed_before)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to release stale queue claims: {error}"))
        })?;

        Ok(result.rows_affected())
    }

    pub(super) async fn delete_partition_entries_impl(&self, key: &PartitionKey) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM ilm_evaluation_queue
            WHERE owner = $1 AND object_name = $2 AND partition_name = $3
            "#,
        )
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete partition queue entries: {error}"))
        })?;

        Ok(result.rows_affected())
    }

    pub(super) async fn delete_policy_entries_impl(&self, policy_id: PolicyId) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM ilm_evaluation_queue WHERE policy_id = $1")
            .bind(policy_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete policy queue entries: {error}"))
            })?;

        Ok(result.rows_affected())
    }
}
