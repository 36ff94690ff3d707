use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use strata_application::{MergeDestination, ObjectDescriptor, PartitionCatalog};
use strata_core::{AppError, AppResult};
use strata_domain::{CompressionCodec, ObjectRef, PartitionKey, PartitionSnapshot};
use tracing::info;

mod bounds;
mod structure;

use bounds::{parse_range_bound, quote_identifier, qualified_name};

/// PostgreSQL catalog adapter over declaratively range-partitioned tables.
///
/// Owners map to schemas, storage locations to tablespaces. PostgreSQL has no
/// per-partition segment codec, so the applied codec is kept in
/// `ilm_partition_codecs` and recompression rewrites the partition.
/// PostgreSQL keeps no per-partition read/write heat either, so snapshots
/// never carry `heat` and tracking falls back to the boundary estimate.
#[derive(Clone)]
pub struct PostgresPartitionCatalog {
    pool: PgPool,
}

impl PostgresPartitionCatalog {
    /// Creates a catalog adapter with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PartitionRow {
    name: String,
    bound: Option<String>,
    location: String,
    codec: Option<String>,
    row_count: i64,
    size_bytes: i64,
}

#[async_trait]
impl PartitionCatalog for PostgresPartitionCatalog {
    async fn find_object(&self, object: &ObjectRef) -> AppResult<Option<ObjectDescriptor>> {
        let partitioned: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT class.relkind = 'p' AS partitioned
            FROM pg_class class
            JOIN pg_namespace namespace ON namespace.oid = class.relnamespace
            WHERE namespace.nspname = lower($1)
              AND class.relname = lower($2)
              AND class.relkind IN ('r', 'p')
            "#,
        )
        .bind(object.owner())
        .bind(object.name())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to look up object '{object}': {error}"))
        })?;

        Ok(partitioned.map(|partitioned| ObjectDescriptor {
            object: object.clone(),
            partitioned,
        }))
    }

    async fn list_partitions(&self, object: &ObjectRef) -> AppResult<Vec<PartitionSnapshot>> {
        let rows = sqlx::query_as::<_, PartitionRow>(
            r#"
            SELECT
                upper(child.relname::TEXT) AS name,
                pg_get_expr(child.relpartbound, child.oid) AS bound,
                upper(COALESCE(tablespace.spcname::TEXT, 'pg_default')) AS location,
                codec.codec AS codec,
                COALESCE(stats.n_live_tup, GREATEST(child.reltuples, 0)::BIGINT) AS row_count,
                pg_total_relation_size(child.oid) AS size_bytes
            FROM pg_inherits inheritance
            JOIN pg_class parent ON parent.oid = inheritance.inhparent
            JOIN pg_namespace namespace ON namespace.oid = parent.relnamespace
            JOIN pg_class child ON child.oid = inheritance.inhrelid
            LEFT JOIN pg_tablespace tablespace ON tablespace.oid = child.reltablespace
            LEFT JOIN pg_stat_user_tables stats ON stats.relid = child.oid
            LEFT JOIN ilm_partition_codecs codec
                ON codec.owner = $1
               AND codec.object_name = $2
               AND codec.partition_name = upper(child.relname::TEXT)
            WHERE namespace.nspname = lower($1)
              AND parent.relname = lower($2)
            "#,
        )
        .bind(object.owner())
        .bind(object.name())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list partitions of '{object}': {error}"))
        })?;

        let mut partitions = rows
            .into_iter()
            .map(partition_from_row)
            .collect::<AppResult<Vec<_>>>()?;
        partitions.sort_by(|left, right| {
            upper_bound_order(left.upper_bound)
                .cmp(&upper_bound_order(right.upper_bound))
                .then_with(|| left.name.cmp(&right.name))
        });

        Ok(partitions)
    }

    async fn location_exists(&self, location: &str) -> AppResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_tablespace WHERE spcname = lower($1))",
        )
        .bind(location)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to look up tablespace '{location}': {error}"))
        })
    }

    async fn recompress(
        &self,
        key: &PartitionKey,
        codec: CompressionCodec,
    ) -> AppResult<PartitionSnapshot> {
        let table = qualified_name(key.object().owner(), key.partition());
        let statement = format!("VACUUM (FULL, ANALYZE) {table}");
        sqlx::raw_sql(&statement)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to rewrite partition '{key}': {error}"))
            })?;
        self.record_codec(key, codec).await?;
        info!(partition = %key, codec = codec.as_str(), "partition recompressed");

        self.snapshot(key).await
    }

    async fn relocate(
        &self,
        key: &PartitionKey,
        location: &str,
        codec: Option<CompressionCodec>,
    ) -> AppResult<PartitionSnapshot> {
        let table = qualified_name(key.object().owner(), key.partition());
        sqlx::query(&format!(
            "ALTER TABLE {table} SET TABLESPACE {}",
            quote_identifier(location)
        ))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to move partition '{key}' to '{location}': {error}"
            ))
        })?;

        if let Some(codec) = codec {
            self.record_codec(key, codec).await?;
        }
        info!(partition = %key, location, "partition relocated");

        self.snapshot(key).await
    }

    async fn drop_partition(&self, key: &PartitionKey) -> AppResult<()> {
        let table = qualified_name(key.object().owner(), key.partition());
        sqlx::query(&format!("DROP TABLE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to drop partition '{key}': {error}"))
            })?;
        self.forget_codec(key).await?;
        info!(partition = %key, "partition dropped");

        Ok(())
    }

    async fn truncate_partition(&self, key: &PartitionKey) -> AppResult<PartitionSnapshot> {
        let table = qualified_name(key.object().owner(), key.partition());
        sqlx::query(&format!("TRUNCATE TABLE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to truncate partition '{key}': {error}"))
            })?;
        info!(partition = %key, "partition truncated");

        let mut snapshot = self.snapshot(key).await?;
        snapshot.row_count = 0;
        Ok(snapshot)
    }

    async fn merge_partition(
        &self,
        source: &PartitionKey,
        destination: &MergeDestination,
    ) -> AppResult<i64> {
        match destination {
            MergeDestination::Rename { name } => self.rename_partition(source, name).await,
            MergeDestination::Existing { name } => self.absorb_partition(source, name).await,
        }
    }
}

impl PostgresPartitionCatalog {
    async fn snapshot(&self, key: &PartitionKey) -> AppResult<PartitionSnapshot> {
        self.list_partitions(key.object())
            .await?
            .into_iter()
            .find(|partition| partition.name.eq_ignore_ascii_case(key.partition()))
            .ok_or_else(|| AppError::NotFound(format!("partition '{key}' does not exist")))
    }

    async fn record_codec(&self, key: &PartitionKey, codec: CompressionCodec) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ilm_partition_codecs (owner, object_name, partition_name, codec)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner, object_name, partition_name) DO UPDATE
            SET codec = EXCLUDED.codec,
                updated_at = now()
            "#,
        )
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .bind(codec.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record codec of '{key}': {error}"))
        })?;

        Ok(())
    }

    async fn forget_codec(&self, key: &PartitionKey) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM ilm_partition_codecs
            WHERE owner = $1 AND object_name = $2 AND partition_name = $3
            "#,
        )
        .bind(key.object().owner())
        .bind(key.object().name())
        .bind(key.partition())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to forget codec of '{key}': {error}"))
        })?;

        Ok(())
    }
}

fn partition_from_row(row: PartitionRow) -> AppResult<PartitionSnapshot> {
    let (lower_bound, upper_bound) = row
        .bound
        .as_deref()
        .map(parse_range_bound)
        .transpose()?
        .unwrap_or((None, None));
    let codec = row
        .codec
        .as_deref()
        .map(str::parse::<CompressionCodec>)
        .transpose()?
        .unwrap_or(CompressionCodec::None);

    Ok(PartitionSnapshot {
        name: row.name,
        lower_bound,
        upper_bound,
        location: row.location,
        codec,
        row_count: row.row_count,
        size_bytes: row.size_bytes,
        heat: None,
    })
}

fn upper_bound_order(bound: Option<NaiveDate>) -> (bool, Option<NaiveDate>) {
    (bound.is_none(), bound)
}
