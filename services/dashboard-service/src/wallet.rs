use axum::{
    Json,
    extract::{Path, Query, State},
};
use hd_api_types::{
    AddExternalWalletRequest, CoinType, ConvertCoinsRequest, GenerateWalletRequest,
    RecoveryPhraseResponse, RestoreWalletsRequest, SendCoinsRequest,
};
use hd_wallet::{Transaction, Wallet, create_recovery_phrase};
use serde::Deserialize;

use crate::{ApiResult, AppState, bad_request, not_found, wallet_error};

#[derive(Debug, Deserialize)]
pub(crate) struct DefaultWalletQuery {
    coin_type: Option<CoinType>,
}

pub(crate) async fn list(State(state): State<AppState>) -> Json<Vec<Wallet>> {
    Json(state.wallet.wallets().await)
}

pub(crate) async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateWalletRequest>,
) -> ApiResult<Wallet> {
    if request.name.trim().is_empty() {
        return Err(bad_request("name is required"));
    }

    let wallet = state
        .wallet
        .generate_wallet(&request.name, request.coin_type)
        .await
        .map_err(wallet_error)?;
    Ok(Json(wallet))
}

pub(crate) async fn add_external(
    State(state): State<AppState>,
    Json(request): Json<AddExternalWalletRequest>,
) -> ApiResult<Wallet> {
    if request.name.trim().is_empty() {
        return Err(bad_request("name is required"));
    }
    if request.address.trim().is_empty() {
        return Err(bad_request("address is required"));
    }

    let wallet = state
        .wallet
        .add_external_wallet(&request.name, &request.address, request.coin_type)
        .await
        .map_err(wallet_error)?;
    Ok(Json(wallet))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Wallet> {
    match state.wallet.wallet(&wallet_id).await {
        Some(wallet) => Ok(Json(wallet)),
        None => Err(not_found("wallet not found")),
    }
}

pub(crate) async fn set_default(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Wallet> {
    let wallet = state
        .wallet
        .set_default_wallet(&wallet_id)
        .await
        .map_err(wallet_error)?;
    Ok(Json(wallet))
}

pub(crate) async fn default(
    State(state): State<AppState>,
    Query(query): Query<DefaultWalletQuery>,
) -> ApiResult<Wallet> {
    match state.wallet.default_wallet(query.coin_type).await {
        Some(wallet) => Ok(Json(wallet)),
        None => Err(not_found("no default wallet")),
    }
}

pub(crate) async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendCoinsRequest>,
) -> ApiResult<Transaction> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(bad_request("invalid amount"));
    }
    if request.to_address.trim().is_empty() {
        return Err(bad_request("to_address is required"));
    }

    let transaction = state
        .wallet
        .send_coins(&request.from_wallet_id, &request.to_address, request.amount)
        .await
        .map_err(wallet_error)?;
    Ok(Json(transaction))
}

pub(crate) async fn convert(
    State(state): State<AppState>,
    Json(request): Json<ConvertCoinsRequest>,
) -> ApiResult<Transaction> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(bad_request("invalid amount"));
    }

    let transaction = state
        .wallet
        .convert_coins(&request.from_wallet_id, request.to_coin, request.amount)
        .await
        .map_err(wallet_error)?;
    Ok(Json(transaction))
}

pub(crate) async fn transactions(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    Json(state.wallet.transactions().await)
}

pub(crate) async fn wallet_transactions(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Vec<Transaction>> {
    if state.wallet.wallet(&wallet_id).await.is_none() {
        return Err(not_found("wallet not found"));
    }
    Ok(Json(state.wallet.wallet_transactions(&wallet_id).await))
}

pub(crate) async fn recovery_phrase() -> Json<RecoveryPhraseResponse> {
    let phrase = create_recovery_phrase();
    let word_count = phrase.split_whitespace().count();
    Json(RecoveryPhraseResponse { phrase, word_count })
}

pub(crate) async fn restore(
    State(state): State<AppState>,
    Json(request): Json<RestoreWalletsRequest>,
) -> ApiResult<Vec<Wallet>> {
    if request.phrase.trim().is_empty() {
        return Err(bad_request("phrase is required"));
    }

    let wallets = state
        .wallet
        .restore_wallets(&request.phrase)
        .await
        .map_err(wallet_error)?;
    Ok(Json(wallets))
}
