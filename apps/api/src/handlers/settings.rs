use axum::Json;
use axum::extract::State;
use strata_application::TaskRun;
use strata_domain::LifecycleSettings;

use crate::dto::{EmergencyStopRequest, LifecycleSettingsDto};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn get_settings_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<LifecycleSettingsDto>> {
    let settings = state.scheduler_service.settings().await?;

    Ok(Json(LifecycleSettingsDto::from(settings)))
}

pub async fn update_settings_handler(
    State(state): State<AppState>,
    Json(payload): Json<LifecycleSettingsDto>,
) -> ApiResult<Json<LifecycleSettingsDto>> {
    let settings = state
        .scheduler_service
        .update_settings(LifecycleSettings::try_from(payload)?)
        .await?;

    Ok(Json(LifecycleSettingsDto::from(settings)))
}

pub async fn emergency_stop_handler(
    State(state): State<AppState>,
    Json(payload): Json<EmergencyStopRequest>,
) -> ApiResult<Json<LifecycleSettingsDto>> {
    let settings = state
        .scheduler_service
        .set_emergency_stop(payload.stopped)
        .await?;

    Ok(Json(LifecycleSettingsDto::from(settings)))
}

pub async fn list_task_runs_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TaskRun>>> {
    Ok(Json(state.scheduler_service.list_task_runs().await?))
}
