//! Strata lifecycle worker runtime.
//!
//! Runs the refresh, evaluate and execute cycle on a fixed interval against
//! the PostgreSQL catalog. `strata-worker once` runs a single cycle and exits.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use strata_application::{
    CycleReport, EvaluationService, ExecutionService, MergeService, PartitionLockCoordinator,
    SchedulerService, TrackingService,
};
use strata_core::{AppError, AppResult};
use strata_infrastructure::{
    InMemoryPartitionLockCoordinator, PostgresLifecycleLogRepository,
    PostgresLifecycleSettingsRepository, PostgresPartitionCatalog,
    PostgresPartitionTrackingRepository, PostgresPolicyRepository, RedisPartitionLockCoordinator,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    redis_url: Option<String>,
    lock_key_prefix: String,
    worker_id: String,
    max_actions: usize,
    cycle_interval_seconds: u64,
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str()).await?;
    let scheduler = build_scheduler_service(pool, &config)?;

    info!(
        worker_id = %config.worker_id,
        max_actions = config.max_actions,
        cycle_interval_seconds = config.cycle_interval_seconds,
        distributed_locks = config.redis_url.is_some(),
        "strata-worker started"
    );

    loop {
        match scheduler.run_cycle(config.max_actions).await {
            Ok(report) => log_cycle(&config.worker_id, &report),
            Err(error) => {
                error!(worker_id = %config.worker_id, error = %error, "lifecycle cycle failed");
            }
        }

        if config.run_once {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(config.cycle_interval_seconds)).await;
    }
}

fn log_cycle(worker_id: &str, report: &CycleReport) {
    if report.halted {
        warn!(worker_id, "lifecycle cycle halted by emergency stop");
    }

    let refreshed = report.refresh.map_or(0, |summary| summary.refreshed);
    let queued = report.evaluation.map_or(0, |summary| summary.queued);
    let (succeeded, failed) = report
        .execution
        .as_ref()
        .map_or((0, 0), |execution| (execution.succeeded, execution.failed));

    info!(
        worker_id,
        refreshed,
        queued,
        succeeded,
        failed,
        refresh_ok = report.refresh.is_some(),
        evaluation_ok = report.evaluation.is_some(),
        "lifecycle cycle finished"
    );
}

async fn connect_and_migrate(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_scheduler_service(pool: PgPool, config: &WorkerConfig) -> AppResult<SchedulerService> {
    let catalog = Arc::new(PostgresPartitionCatalog::new(pool.clone()));
    let policies = Arc::new(PostgresPolicyRepository::new(pool.clone()));
    let tracking = Arc::new(PostgresPartitionTrackingRepository::new(pool.clone()));
    let logs = Arc::new(PostgresLifecycleLogRepository::new(pool.clone()));
    let settings = Arc::new(PostgresLifecycleSettingsRepository::new(pool));
    let locks = build_lock_coordinator(config)?;

    let tracking_service = TrackingService::new(
        catalog.clone(),
        tracking.clone(),
        policies.clone(),
        settings.clone(),
        locks.clone(),
    )
    .with_holder_id(config.worker_id.as_str());
    let evaluation_service =
        EvaluationService::new(policies, tracking.clone(), tracking.clone(), settings.clone());
    let merge_service = MergeService::new(
        catalog.clone(),
        tracking.clone(),
        tracking.clone(),
        logs.clone(),
        settings.clone(),
        locks.clone(),
    )
    .with_holder_id(config.worker_id.as_str());
    let execution_service = ExecutionService::new(
        catalog,
        tracking.clone(),
        tracking,
        logs,
        settings.clone(),
        locks,
    )
    .with_merge_service(merge_service)
    .with_holder_id(config.worker_id.as_str());

    Ok(SchedulerService::new(
        tracking_service,
        evaluation_service,
        execution_service,
        settings.clone(),
        settings,
    ))
}

fn build_lock_coordinator(config: &WorkerConfig) -> AppResult<Arc<dyn PartitionLockCoordinator>> {
    match config.redis_url.as_deref() {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Ok(Arc::new(RedisPartitionLockCoordinator::new(
                client,
                config.lock_key_prefix.clone(),
            )))
        }
        None => {
            warn!("REDIS_URL is not set, partition locks are local to this worker");
            Ok(Arc::new(InMemoryPartitionLockCoordinator::new()))
        }
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let lock_key_prefix =
            env::var("ILM_LOCK_KEY_PREFIX").unwrap_or_else(|_| "strata:ilm:lock".to_owned());
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let max_actions = parse_env_usize("ILM_MAX_ACTIONS", 100)?;
        let cycle_interval_seconds = parse_env_u64("WORKER_CYCLE_INTERVAL_SECONDS", 300)?;
        let run_once = env::args().nth(1).as_deref() == Some("once");

        if max_actions == 0 {
            return Err(AppError::Validation(
                "ILM_MAX_ACTIONS must be greater than zero".to_owned(),
            ));
        }

        if cycle_interval_seconds == 0 {
            return Err(AppError::Validation(
                "WORKER_CYCLE_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            lock_key_prefix,
            worker_id,
            max_actions,
            cycle_interval_seconds,
            run_once,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
