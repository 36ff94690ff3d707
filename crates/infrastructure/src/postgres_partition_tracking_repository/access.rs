use super::*;

const ACCESS_COLUMNS: &str = r#"
    owner,
    object_name,
    partition_name,
    last_write_at,
    last_read_at,
    read_count,
    write_count,
    heat_observations,
    row_count,
    size_bytes,
    codec,
    location,
    age_days,
    temperature,
    estimate_source,
    refreshed_at
"#;

impl PostgresPartitionTrackingRepository {
    pub(super) async fn upsert_record_impl(&self, record: PartitionAccessRecord) -> AppResult<()> {
        let object = record.key.object();

        sqlx::query(
            r#"
            INSERT INTO ilm_partition_access (
                owner,
                object_name,
                partition_name,
                last_write_at,
                last_read_at,
                read_count,
                write_count,
                heat_observations,
                row_count,
                size_bytes,
                codec,
                location,
                age_days,
                temperature,
                estimate_source,
                refreshed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (owner, object_name, partition_name) DO UPDATE
            SET last_write_at = EXCLUDED.last_write_at,
                last_read_at = EXCLUDED.last_read_at,
                read_count = EXCLUDED.read_count,
                write_count = EXCLUDED.write_count,
                heat_observations = EXCLUDED.heat_observations,
                row_count = EXCLUDED.row_count,
                size_bytes = EXCLUDED.size_bytes,
                codec = EXCLUDED.codec,
                location = EXCLUDED.location,
                age_days = EXCLUDED.age_days,
                temperature = EXCLUDED.temperature,
                estimate_source = EXCLUDED.estimate_source,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(object.owner())
        .bind(object.name())
        .bind(record.key.partition())
        .bind(record.last_write_at)
        .bind(record.last_read_at)
        .bind(record.read_count)
        .bind(record.write_count)
        .bind(record.heat_observations)
        .bind(record.row_count)
        .bind(record.size_bytes)
        .bind(record.codec.as_str())
        .bind(record.location.as_str())
        .bind(record.age_days)
        .bind(record.temperature.as_str())
        .bind(record.estimate_source.as_str())
        .bind(record.refreshed_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to upsert access record for '{}': {error}",
                record.key
            ))
        })?;

        Ok(())
    }

    pub(super) async fn find_record_impl(
        &self,
        key: &PartitionKey,
    ) -> AppResult<Option<PartitionAccessRecord>> {
        let row = sqlx::query_as::<_, AccessRecordRow>(&format!(
            r#"
            SELECT {ACCESS_COLUMNS}
            FROM ilm_partition_access
            WHERE owner = $1 AND object_name = $2 AND partition_name = $3
            "#
        ))
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find access record: {error}")))?;

        row.map(access_record_from_row).transpose()
    }

    pub(super) async fn list_records_impl(
        &self,
        object: &ObjectRef,
    ) -> AppResult<Vec<PartitionAccessRecord>> {
        let rows = sqlx::query_as::<_, AccessRecordRow>(&format!(
            r#"
            SELECT {ACCESS_COLUMNS}
            FROM ilm_partition_access
            WHERE owner = $1 AND object_name = $2
            ORDER BY partition_name
            "#
        ))
        .bind(object.owner())
        .bind(object.name())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list access records: {error}")))?;

        rows.into_iter().map(access_record_from_row).collect()
    }

    pub(super) async fn delete_record_impl(&self, key: &PartitionKey) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM ilm_partition_access
            WHERE owner = $1 AND object_name = $2 AND partition_name = $3
            "#,
        )
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete access record: {error}")))?;

        Ok(())
    }
}
