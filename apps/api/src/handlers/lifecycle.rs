use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use strata_application::{
    CycleReport, EvaluationQueueEntry, EvaluationSummary, ExecutionReport, PartitionMergeRecord,
    RefreshSummary,
};
use strata_domain::{
    ObjectRef, PartitionAccessRecord, PartitionBoundary, PartitionKey, PolicyId, build_boundaries,
};

use crate::dto::{
    BoundaryPreviewRequest, EvaluateRequest, ExecuteRequest, MergeRequest, QueueListQuery,
    RefreshRequest, RunCycleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshSummary>> {
    let summary = match payload.object()? {
        Some(object) => state.tracking_service.refresh(&object).await?,
        None => state.tracking_service.refresh_all().await?,
    };

    Ok(Json(summary))
}

pub async fn evaluate_handler(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> ApiResult<Json<EvaluationSummary>> {
    let summary = match payload.policy_id {
        Some(policy_id) => {
            state
                .evaluation_service
                .evaluate(PolicyId::from_uuid(policy_id))
                .await?
        }
        None => state.evaluation_service.evaluate_all().await?,
    };

    Ok(Json(summary))
}

pub async fn execute_handler(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> ApiResult<Json<ExecutionReport>> {
    let scope = payload.scope()?;
    let report = state
        .execution_service
        .execute(
            payload.max_actions.unwrap_or(state.default_max_actions),
            payload.simulate,
            scope,
        )
        .await?;

    Ok(Json(report))
}

pub async fn merge_handler(
    State(state): State<AppState>,
    Json(payload): Json<MergeRequest>,
) -> ApiResult<Json<PartitionMergeRecord>> {
    let key = PartitionKey::new(payload.owner, payload.object, payload.partition)?;
    let record = state.merge_service.merge_into_coarser(&key).await?;

    Ok(Json(record))
}

pub async fn run_cycle_handler(
    State(state): State<AppState>,
    Json(payload): Json<RunCycleRequest>,
) -> ApiResult<Json<CycleReport>> {
    let report = state
        .scheduler_service
        .run_cycle(payload.max_actions.unwrap_or(state.default_max_actions))
        .await?;

    Ok(Json(report))
}

pub async fn list_queue_handler(
    State(state): State<AppState>,
    Query(query): Query<QueueListQuery>,
) -> ApiResult<Json<Vec<EvaluationQueueEntry>>> {
    let entries = state
        .evaluation_queue
        .list_entries(query.policy_id.map(PolicyId::from_uuid))
        .await?;

    Ok(Json(entries))
}

pub async fn list_object_partitions_handler(
    State(state): State<AppState>,
    Path((owner, object)): Path<(String, String)>,
) -> ApiResult<Json<Vec<PartitionAccessRecord>>> {
    let object = ObjectRef::new(owner, object)?;
    let records = state.access_records.list_records(&object).await?;

    Ok(Json(records))
}

pub async fn preview_boundaries_handler(
    Json(payload): Json<BoundaryPreviewRequest>,
) -> ApiResult<Json<Vec<PartitionBoundary>>> {
    let tier_config = payload.tier_config()?;
    let today = payload.today.unwrap_or_else(|| Utc::now().date_naive());
    payload.check_span(today)?;
    let boundaries = build_boundaries(
        payload.min_date,
        payload.max_date,
        today,
        tier_config.as_ref(),
    )?;

    Ok(Json(boundaries))
}
