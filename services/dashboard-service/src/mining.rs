use axum::{
    Json,
    extract::{Path, State},
};
use hd_api_types::{StartMiningRequest, SystemStatsResponse, UserRole};
use hd_mining::MiningTask;

use crate::{ApiResult, AppState, bad_request, mining_error, not_found, unauthorized};

pub(crate) async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartMiningRequest>,
) -> ApiResult<MiningTask> {
    if !request.target_reward.is_finite() || request.target_reward <= 0.0 {
        return Err(bad_request("target_reward must be positive"));
    }

    let algorithm = request
        .algorithm
        .unwrap_or_else(|| request.coin_type.algorithm());

    let task = state
        .mining
        .start_mining(algorithm, request.coin_type, request.target_reward)
        .await
        .map_err(mining_error)?;
    Ok(Json(task))
}

pub(crate) async fn pause(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<MiningTask> {
    state
        .mining
        .pause_mining(&task_id)
        .await
        .map_err(mining_error)?;
    current_task(&state, &task_id).await
}

pub(crate) async fn resume(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<MiningTask> {
    state
        .mining
        .resume_mining(&task_id)
        .await
        .map_err(mining_error)?;
    current_task(&state, &task_id).await
}

pub(crate) async fn stop(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<MiningTask> {
    state
        .mining
        .stop_mining(&task_id)
        .await
        .map_err(mining_error)?;
    current_task(&state, &task_id).await
}

pub(crate) async fn tasks(State(state): State<AppState>) -> Json<Vec<MiningTask>> {
    Json(state.mining.user_tasks().await)
}

pub(crate) async fn active(State(state): State<AppState>) -> ApiResult<MiningTask> {
    match state.mining.active_task().await {
        Some(task) => Ok(Json(task)),
        None => Err(not_found("no active mining task")),
    }
}

pub(crate) async fn all_tasks(State(state): State<AppState>) -> ApiResult<Vec<MiningTask>> {
    require_admin(&state).await?;
    match state.mining.all_tasks().await {
        Some(tasks) => Ok(Json(tasks)),
        None => Ok(Json(Vec::new())),
    }
}

pub(crate) async fn stats(State(state): State<AppState>) -> ApiResult<SystemStatsResponse> {
    require_admin(&state).await?;

    let counts = state.mining.system_task_counts().await;
    Ok(Json(SystemStatsResponse {
        hashrate: state.mining.system_hashrate().await,
        active: counts.active,
        completed: counts.completed,
        failed: counts.failed,
    }))
}

async fn require_admin(
    state: &AppState,
) -> Result<(), (axum::http::StatusCode, Json<crate::ErrorResponse>)> {
    match state.session.current().await {
        Some(identity) if identity.role == UserRole::Admin => Ok(()),
        Some(_) => Err(unauthorized("admin scope required")),
        None => Err(unauthorized("not logged in")),
    }
}

/// Wrong-state transitions are silent no-ops in the store; the response is
/// simply the task's current state, or 404 for an unknown id.
async fn current_task(state: &AppState, task_id: &str) -> ApiResult<MiningTask> {
    match state.mining.task(task_id).await {
        Some(task) => Ok(Json(task)),
        None => Err(not_found("task not found")),
    }
}
