use axum::{Json, extract::State};
use hd_api_types::{LoginRequest, RegisterRequest};
use hd_session::Identity;
use serde::Serialize;

use crate::{ApiResult, AppState, bad_request, internal_error, unauthorized};

#[derive(Debug, Serialize)]
pub(crate) struct LogoutResponse {
    pub(crate) logged_out: bool,
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Identity> {
    if request.email.trim().is_empty() {
        return Err(bad_request("email is required"));
    }

    let identity = state
        .session
        .login(&request.email, &request.password)
        .await
        .map_err(internal_error)?;

    reload_stores(&state).await?;
    Ok(Json(identity))
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Identity> {
    if request.username.trim().is_empty() {
        return Err(bad_request("username is required"));
    }
    if request.email.trim().is_empty() {
        return Err(bad_request("email is required"));
    }

    let identity = state
        .session
        .register(&request.username, &request.email, &request.password)
        .await
        .map_err(internal_error)?;

    reload_stores(&state).await?;
    Ok(Json(identity))
}

pub(crate) async fn logout(State(state): State<AppState>) -> ApiResult<LogoutResponse> {
    state.session.logout().await.map_err(internal_error)?;
    reload_stores(&state).await?;
    Ok(Json(LogoutResponse { logged_out: true }))
}

pub(crate) async fn session(State(state): State<AppState>) -> ApiResult<Identity> {
    match state.session.current().await {
        Some(identity) => Ok(Json(identity)),
        None => Err(unauthorized("not logged in")),
    }
}

/// Task and wallet state is scoped by identity, so both stores reload after
/// every session change.
async fn reload_stores(state: &AppState) -> Result<(), (axum::http::StatusCode, Json<crate::ErrorResponse>)> {
    state.mining.load().await.map_err(internal_error)?;
    state.wallet.load().await.map_err(internal_error)?;
    Ok(())
}
