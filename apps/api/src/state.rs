use std::sync::Arc;

use sqlx::PgPool;
use strata_application::{
    AccessRecordRepository, EvaluationQueueRepository, EvaluationService, ExecutionService,
    MergeService, PolicyService, ReportingService, SchedulerService, TrackingService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub policy_service: PolicyService,
    pub tracking_service: TrackingService,
    pub evaluation_service: EvaluationService,
    pub execution_service: ExecutionService,
    pub merge_service: MergeService,
    pub scheduler_service: SchedulerService,
    pub reporting_service: ReportingService,
    pub access_records: Arc<dyn AccessRecordRepository>,
    pub evaluation_queue: Arc<dyn EvaluationQueueRepository>,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
    pub default_max_actions: usize,
}
