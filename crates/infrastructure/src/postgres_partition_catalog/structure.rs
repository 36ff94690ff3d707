use super::*;

use super::bounds::render_bound_value;

impl PostgresPartitionCatalog {
    pub(super) async fn rename_partition(
        &self,
        source: &PartitionKey,
        destination: &str,
    ) -> AppResult<i64> {
        let owner = source.object().owner();
        let table = qualified_name(owner, source.partition());
        let rows_merged: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count rows of '{source}': {error}"))
            })?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start rename transaction: {error}"))
        })?;

        sqlx::query(&format!(
            "ALTER TABLE {table} RENAME TO {}",
            quote_identifier(destination)
        ))
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to rename '{source}' to '{destination}': {error}"
            ))
        })?;

        sqlx::query(
            r#"
            UPDATE ilm_partition_codecs
            SET partition_name = $4,
                updated_at = now()
            WHERE owner = $1 AND object_name = $2 AND partition_name = $3
            "#,
        )
        .bind(owner)
        .bind(source.object().name())
        .bind(source.partition())
        .bind(destination.to_ascii_uppercase())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to carry codec of '{source}': {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit rename transaction: {error}"))
        })?;
        info!(partition = %source, destination, "partition renamed into coarse partition");

        Ok(rows_merged)
    }

    pub(super) async fn absorb_partition(
        &self,
        source: &PartitionKey,
        destination: &str,
    ) -> AppResult<i64> {
        let object = source.object();
        let partitions = self.list_partitions(object).await?;
        let find = |name: &str| {
            partitions
                .iter()
                .find(|partition| partition.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    AppError::NotFound(format!("partition '{object}.{name}' does not exist"))
                })
        };
        let source_snapshot = find(source.partition())?;
        let destination_snapshot = find(destination)?;

        let lower = match (source_snapshot.lower_bound, destination_snapshot.lower_bound) {
            (Some(left), Some(right)) => Some(left.min(right)),
            _ => None,
        };
        let upper = match (source_snapshot.upper_bound, destination_snapshot.upper_bound) {
            (Some(left), Some(right)) => Some(left.max(right)),
            _ => None,
        };

        let parent = qualified_name(object.owner(), object.name());
        let source_table = qualified_name(object.owner(), source.partition());
        let destination_table = qualified_name(object.owner(), destination);

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start merge transaction: {error}"))
        })?;

        for statement in [
            format!("ALTER TABLE {parent} DETACH PARTITION {destination_table}"),
            format!("ALTER TABLE {parent} DETACH PARTITION {source_table}"),
        ] {
            sqlx::query(&statement)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to detach for merge of '{source}': {error}"))
                })?;
        }

        let inserted = sqlx::query(&format!(
            "INSERT INTO {destination_table} SELECT * FROM {source_table}"
        ))
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to copy rows of '{source}' into '{destination}': {error}"
            ))
        })?;

        for statement in [
            format!("DROP TABLE {source_table}"),
            format!(
                "ALTER TABLE {parent} ATTACH PARTITION {destination_table} FOR VALUES FROM ({}) TO ({})",
                render_bound_value(lower, "MINVALUE"),
                render_bound_value(upper, "MAXVALUE"),
            ),
        ] {
            sqlx::query(&statement)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to reattach after merge of '{source}': {error}"))
                })?;
        }

        sqlx::query(
            r#"
            DELETE FROM ilm_partition_codecs
            WHERE owner = $1 AND object_name = $2 AND partition_name = $3
            "#,
        )
        .bind(object.owner())
        .bind(object.name())
        .bind(source.partition())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to forget codec of '{source}': {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit merge transaction: {error}"))
        })?;

        let rows_merged = i64::try_from(inserted.rows_affected()).unwrap_or(i64::MAX);
        info!(partition = %source, destination, rows_merged, "partition merged into coarse partition");

        Ok(rows_merged)
    }
}
