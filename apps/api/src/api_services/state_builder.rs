use std::sync::Arc;

use sqlx::PgPool;
use strata_application::{
    EvaluationService, ExecutionService, MergeService, PolicyService, ReportingService,
    SchedulerService, TrackingService,
};
use strata_core::AppError;
use strata_infrastructure::InMemoryPartitionCatalog;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::redis::build_redis_client;

mod locks;
mod repositories;

const LOCK_HOLDER_ID: &str = "strata-api";

/// Application state plus the handles only startup code needs.
pub struct BuiltAppState {
    pub app_state: AppState,
    pub in_memory_catalog: Option<Arc<InMemoryPartitionCatalog>>,
}

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<BuiltAppState, AppError> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let repositories = repositories::build_repository_set(&pool, config);
    let locks = locks::build_lock_coordinator(config, redis_client.clone());

    let tracking_service = TrackingService::new(
        repositories.catalog.clone(),
        repositories.tracking_repository.clone(),
        repositories.policy_repository.clone(),
        repositories.settings_repository.clone(),
        locks.clone(),
    )
    .with_holder_id(LOCK_HOLDER_ID);
    let evaluation_service = EvaluationService::new(
        repositories.policy_repository.clone(),
        repositories.tracking_repository.clone(),
        repositories.tracking_repository.clone(),
        repositories.settings_repository.clone(),
    );
    let merge_service = MergeService::new(
        repositories.catalog.clone(),
        repositories.tracking_repository.clone(),
        repositories.tracking_repository.clone(),
        repositories.log_repository.clone(),
        repositories.settings_repository.clone(),
        locks.clone(),
    )
    .with_holder_id(LOCK_HOLDER_ID);
    let execution_service = ExecutionService::new(
        repositories.catalog.clone(),
        repositories.tracking_repository.clone(),
        repositories.tracking_repository.clone(),
        repositories.log_repository.clone(),
        repositories.settings_repository.clone(),
        locks,
    )
    .with_merge_service(merge_service.clone())
    .with_holder_id(LOCK_HOLDER_ID);

    let scheduler_service = SchedulerService::new(
        tracking_service.clone(),
        evaluation_service.clone(),
        execution_service.clone(),
        repositories.settings_repository.clone(),
        repositories.settings_repository.clone(),
    );

    Ok(BuiltAppState {
        app_state: AppState {
            policy_service: PolicyService::new(
                repositories.catalog,
                repositories.policy_repository,
                repositories.tracking_repository.clone(),
            ),
            tracking_service,
            evaluation_service,
            execution_service,
            merge_service,
            scheduler_service,
            reporting_service: ReportingService::new(
                repositories.log_repository.clone(),
                repositories.log_repository,
            ),
            access_records: repositories.tracking_repository.clone(),
            evaluation_queue: repositories.tracking_repository,
            postgres_pool: pool,
            redis_client,
            default_max_actions: config.default_max_actions,
        },
        in_memory_catalog: repositories.in_memory_catalog,
    })
}
