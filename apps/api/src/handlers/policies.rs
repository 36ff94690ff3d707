use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use strata_domain::{PolicyId, PolicyInput, PolicyTemplate, ThresholdProfile};
use uuid::Uuid;

use crate::dto::{
    ApplyTemplateRequest, PolicyResponse, PolicyWriteResponse, SavePolicyTemplateRequest,
    SaveThresholdProfileRequest, SetPolicyEnabledRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_policies_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PolicyResponse>>> {
    let policies = state
        .policy_service
        .list_policies()
        .await?
        .into_iter()
        .map(PolicyResponse::from)
        .collect();

    Ok(Json(policies))
}

pub async fn create_policy_handler(
    State(state): State<AppState>,
    Json(payload): Json<PolicyInput>,
) -> ApiResult<(StatusCode, Json<PolicyWriteResponse>)> {
    let result = state.policy_service.create_policy(payload).await?;

    Ok((StatusCode::CREATED, Json(PolicyWriteResponse::from(result))))
}

pub async fn get_policy_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> ApiResult<Json<PolicyResponse>> {
    let policy = state
        .policy_service
        .get_policy(PolicyId::from_uuid(policy_id))
        .await?;

    Ok(Json(PolicyResponse::from(policy)))
}

pub async fn update_policy_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    Json(payload): Json<PolicyInput>,
) -> ApiResult<Json<PolicyWriteResponse>> {
    let result = state
        .policy_service
        .update_policy(PolicyId::from_uuid(policy_id), payload)
        .await?;

    Ok(Json(PolicyWriteResponse::from(result)))
}

pub async fn set_policy_enabled_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    Json(payload): Json<SetPolicyEnabledRequest>,
) -> ApiResult<Json<PolicyResponse>> {
    let policy = state
        .policy_service
        .set_policy_enabled(PolicyId::from_uuid(policy_id), payload.enabled)
        .await?;

    Ok(Json(PolicyResponse::from(policy)))
}

pub async fn delete_policy_handler(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .policy_service
        .delete_policy(PolicyId::from_uuid(policy_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_profiles_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ThresholdProfile>>> {
    Ok(Json(state.policy_service.list_profiles().await?))
}

pub async fn save_profile_handler(
    State(state): State<AppState>,
    Path(profile_name): Path<String>,
    Json(payload): Json<SaveThresholdProfileRequest>,
) -> ApiResult<Json<ThresholdProfile>> {
    let profile = state
        .policy_service
        .save_profile(
            profile_name.as_str(),
            payload.hot_days,
            payload.warm_days,
            payload.cold_days,
            payload.description,
        )
        .await?;

    Ok(Json(profile))
}

pub async fn delete_profile_handler(
    State(state): State<AppState>,
    Path(profile_name): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .policy_service
        .delete_profile(profile_name.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_templates_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PolicyTemplate>>> {
    Ok(Json(state.policy_service.list_templates().await?))
}

pub async fn save_template_handler(
    State(state): State<AppState>,
    Path(template_name): Path<String>,
    Json(payload): Json<SavePolicyTemplateRequest>,
) -> ApiResult<Json<PolicyTemplate>> {
    let template = state
        .policy_service
        .save_template(template_name.as_str(), payload.description, payload.document)
        .await?;

    Ok(Json(template))
}

pub async fn delete_template_handler(
    State(state): State<AppState>,
    Path(template_name): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .policy_service
        .delete_template(template_name.as_str())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply_template_handler(
    State(state): State<AppState>,
    Json(payload): Json<ApplyTemplateRequest>,
) -> ApiResult<(StatusCode, Json<Vec<PolicyWriteResponse>>)> {
    let (source, owner, object) = payload.into_parts()?;
    let results = state
        .policy_service
        .apply_template(source, owner.as_str(), object.as_str())
        .await?
        .into_iter()
        .map(PolicyWriteResponse::from)
        .collect();

    Ok((StatusCode::CREATED, Json(results)))
}
