use axum::Json;
use axum::extract::{Query, State};
use strata_application::{AuditLogQuery, ExecutionLogEntry, PartitionMergeRecord, PolicyEffectiveness};

use crate::dto::{AuditQueryParams, LifecycleReportResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn summary_report_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<LifecycleReportResponse>> {
    let query = AuditLogQuery::try_from(params)?;
    let executions = state
        .reporting_service
        .execution_summary(query.clone())
        .await?;
    let merges = state.reporting_service.merge_summary(query).await?;

    Ok(Json(LifecycleReportResponse { executions, merges }))
}

pub async fn policy_effectiveness_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<Vec<PolicyEffectiveness>>> {
    let rollups = state
        .reporting_service
        .policy_effectiveness(AuditLogQuery::try_from(params)?)
        .await?;

    Ok(Json(rollups))
}

pub async fn list_executions_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<Vec<ExecutionLogEntry>>> {
    let entries = state
        .reporting_service
        .list_executions(AuditLogQuery::try_from(params)?)
        .await?;

    Ok(Json(entries))
}

pub async fn list_merges_handler(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<Vec<PartitionMergeRecord>>> {
    let records = state
        .reporting_service
        .list_merges(AuditLogQuery::try_from(params)?)
        .await?;

    Ok(Json(records))
}
