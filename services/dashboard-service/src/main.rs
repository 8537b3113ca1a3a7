use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use hd_mining::{MiningError, MiningStore};
use hd_session::SessionStore;
use hd_storage::{Clock, InMemoryStore, RocksDbStore, StateStore, SystemClock};
use hd_wallet::{WalletError, WalletStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::time;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

mod auth;
mod config;
mod mining;
mod wallet;

use config::ServiceConfig;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) session: Arc<SessionStore>,
    pub(crate) mining: Arc<MiningStore>,
    pub(crate) wallet: Arc<WalletStore>,
}

impl AppState {
    fn build(config: &ServiceConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn StateStore> = match &config.data_dir {
            Some(path) => Arc::new(RocksDbStore::open_default(path)?),
            None => Arc::new(InMemoryStore::default()),
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let session = Arc::new(SessionStore::new(store.clone(), clock.clone()));
        let mining = Arc::new(MiningStore::new(store.clone(), session.clone(), clock.clone()));
        let wallet = Arc::new(WalletStore::new(store, session.clone(), clock));

        Ok(Self {
            session,
            mining,
            wallet,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;
    let state = AppState::build(&config)?;

    if let Some(identity) = state.session.restore().await? {
        info!(user_id = %identity.id, "restored persisted session");
    }
    state.mining.load().await?;
    state.wallet.load().await?;

    // Background simulation: the only autonomous mutation in the system.
    let ticker_store = state.mining.clone();
    let tick_interval = config.tick_interval;
    tokio::spawn(async move {
        let mut ticker = time::interval(tick_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = ticker_store.tick().await {
                warn!(?err, "mining tick failed");
            }
        }
    });

    let app = router(state).layer(CorsLayer::permissive());

    info!(addr = %config.listen_addr, tick = ?config.tick_interval, "dashboard-service listening");
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/mining/start", post(mining::start))
        .route("/mining/tasks", get(mining::tasks))
        .route("/mining/active", get(mining::active))
        .route("/mining/all", get(mining::all_tasks))
        .route("/mining/stats", get(mining::stats))
        .route("/mining/{id}/pause", post(mining::pause))
        .route("/mining/{id}/resume", post(mining::resume))
        .route("/mining/{id}/stop", post(mining::stop))
        .route("/wallets", get(wallet::list).post(wallet::generate))
        .route("/wallets/external", post(wallet::add_external))
        .route("/wallets/default", get(wallet::default))
        .route("/wallets/send", post(wallet::send))
        .route("/wallets/convert", post(wallet::convert))
        .route("/wallets/{id}", get(wallet::get))
        .route("/wallets/{id}/default", post(wallet::set_default))
        .route("/wallets/{id}/transactions", get(wallet::wallet_transactions))
        .route("/transactions", get(wallet::transactions))
        .route("/recovery-phrase", post(wallet::recovery_phrase))
        .route("/recovery-phrase/restore", post(wallet::restore))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "dashboard-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "dashboard-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn not_found(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

pub(crate) fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub(crate) fn mining_error(err: MiningError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        MiningError::NotLoggedIn => unauthorized(&err.to_string()),
        MiningError::Store(inner) => internal_error(inner),
    }
}

pub(crate) fn wallet_error(err: WalletError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        WalletError::NotLoggedIn => unauthorized(&err.to_string()),
        WalletError::WalletNotFound(_) => not_found(&err.to_string()),
        WalletError::InsufficientBalance { .. } | WalletError::InvalidRecoveryPhrase => {
            bad_request(&err.to_string())
        }
        WalletError::Store(inner) => internal_error(inner),
    }
}
