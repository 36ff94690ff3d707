use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use strata_application::{SettingsRepository, TaskRun, TaskRunRepository, TaskRunStatus};
use strata_core::{AppError, AppResult};
use strata_domain::{LifecycleSettings, Thresholds};

/// PostgreSQL-backed settings row and task run status.
#[derive(Clone)]
pub struct PostgresLifecycleSettingsRepository {
    pool: PgPool,
}

impl PostgresLifecycleSettingsRepository {
    /// Creates a settings repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SettingsRow {
    hot_days: i32,
    warm_days: i32,
    cold_days: i32,
    frozen_split: bool,
    auto_merge: bool,
    lock_timeout_seconds: i32,
    lock_lease_seconds: i32,
    emergency_stop: bool,
}

#[derive(Debug, FromRow)]
struct TaskRunRow {
    task_name: String,
    status: String,
    detail: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl SettingsRepository for PostgresLifecycleSettingsRepository {
    async fn load_settings(&self) -> AppResult<LifecycleSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT
                hot_days,
                warm_days,
                cold_days,
                frozen_split,
                auto_merge,
                lock_timeout_seconds,
                lock_lease_seconds,
                emergency_stop
            FROM ilm_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load lifecycle settings: {error}")))?;

        row.map_or_else(|| Ok(LifecycleSettings::default()), settings_from_row)
    }

    async fn save_settings(&self, settings: LifecycleSettings) -> AppResult<()> {
        let thresholds = settings.thresholds();

        sqlx::query(
            r#"
            INSERT INTO ilm_settings (
                id,
                hot_days,
                warm_days,
                cold_days,
                frozen_split,
                auto_merge,
                lock_timeout_seconds,
                lock_lease_seconds,
                emergency_stop,
                updated_at
            )
            VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, now())
            ON CONFLICT (id) DO UPDATE
            SET hot_days = EXCLUDED.hot_days,
                warm_days = EXCLUDED.warm_days,
                cold_days = EXCLUDED.cold_days,
                frozen_split = EXCLUDED.frozen_split,
                auto_merge = EXCLUDED.auto_merge,
                lock_timeout_seconds = EXCLUDED.lock_timeout_seconds,
                lock_lease_seconds = EXCLUDED.lock_lease_seconds,
                emergency_stop = EXCLUDED.emergency_stop,
                updated_at = now()
            "#,
        )
        .bind(stored_u32(thresholds.hot_days())?)
        .bind(stored_u32(thresholds.warm_days())?)
        .bind(stored_u32(thresholds.cold_days())?)
        .bind(settings.frozen_split())
        .bind(settings.auto_merge())
        .bind(stored_u32(settings.lock_timeout_seconds())?)
        .bind(stored_u32(settings.lock_lease_seconds())?)
        .bind(settings.emergency_stop())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save lifecycle settings: {error}")))?;

        Ok(())
    }

    async fn is_emergency_stopped(&self) -> AppResult<bool> {
        let stopped: Option<bool> =
            sqlx::query_scalar("SELECT emergency_stop FROM ilm_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read emergency stop flag: {error}"))
                })?;

        Ok(stopped.unwrap_or(false))
    }
}

#[async_trait]
impl TaskRunRepository for PostgresLifecycleSettingsRepository {
    async fn save_task_run(&self, run: TaskRun) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ilm_task_runs (task_name, status, detail, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (task_name) DO UPDATE
            SET status = EXCLUDED.status,
                detail = EXCLUDED.detail,
                started_at = EXCLUDED.started_at,
                finished_at = EXCLUDED.finished_at
            "#,
        )
        .bind(run.task_name.as_str())
        .bind(run.status.as_str())
        .bind(run.detail.as_deref())
        .bind(run.started_at)
        .bind(run.finished_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save task run '{}': {error}",
                run.task_name
            ))
        })?;

        Ok(())
    }

    async fn list_task_runs(&self) -> AppResult<Vec<TaskRun>> {
        let rows = sqlx::query_as::<_, TaskRunRow>(
            r#"
            SELECT task_name, status, detail, started_at, finished_at
            FROM ilm_task_runs
            ORDER BY task_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list task runs: {error}")))?;

        rows.into_iter()
            .map(|row| {
                Ok(TaskRun {
                    task_name: row.task_name,
                    status: TaskRunStatus::parse(row.status.as_str())?,
                    detail: row.detail,
                    started_at: row.started_at,
                    finished_at: row.finished_at,
                })
            })
            .collect()
    }
}

fn settings_from_row(row: SettingsRow) -> AppResult<LifecycleSettings> {
    let thresholds = Thresholds::new(
        loaded_u32(row.hot_days)?,
        loaded_u32(row.warm_days)?,
        loaded_u32(row.cold_days)?,
    )?;

    LifecycleSettings::new(
        thresholds,
        row.frozen_split,
        row.auto_merge,
        loaded_u32(row.lock_timeout_seconds)?,
        loaded_u32(row.lock_lease_seconds)?,
        row.emergency_stop,
    )
}

fn stored_u32(value: u32) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|_| AppError::Validation(format!("setting value '{value}' is out of range")))
}

fn loaded_u32(value: i32) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("stored setting value '{value}' is negative")))
}
