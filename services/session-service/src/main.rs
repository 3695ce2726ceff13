mod config;
mod dex;
mod history;
mod notices;
mod session;
mod tokens;
mod wallet;


use axum::{
    Json, Router,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use dd_abi::units::parse_ether;
use dd_chains::ChainRegistry;
use dd_provider::{InMemoryWallet, WalletProvider};
use dd_provider_rpc::JsonRpcWallet;
use dd_session::{SessionConfig, SessionError, SessionHandle, SessionManager};
use dd_storage::{InMemoryTxHistory, RocksDbTxHistory, TxHistory};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::{ServiceConfig, WalletMode};
use crate::notices::NoticeLog;

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
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) session: SessionHandle,
    pub(crate) history: Arc<dyn TxHistory>,
    pub(crate) notices: Arc<NoticeLog>,
    pub(crate) receipt_poll_interval: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;
    let registry = Arc::new(ChainRegistry::from_env()?);
    let session_config = SessionConfig::from_env(&registry)?;

    let provider = build_provider(&config, &registry)?;
    let history = open_history(&config)?;
    let session = SessionManager::spawn(provider, registry, session_config);

    let notices = Arc::new(NoticeLog::default());
    notices::spawn_collector(notices.clone(), session.notices());

    let state = AppState {
        session,
        history,
        notices,
        receipt_poll_interval: config.receipt_poll_interval,
    };

    let addr = config.bind_addr;
    info!("session-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub(crate) fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/session", get(session::get_session))
        .route("/session/connect", post(session::connect))
        .route("/session/disconnect", post(session::disconnect))
        .route("/session/switch-chain", post(session::switch_chain))
        .route("/wallet/send", post(wallet::send_native))
        .route("/wallet/transaction", post(wallet::send_transaction))
        .route("/wallet/sign", post(wallet::sign_message))
        .route("/wallet/preview", post(wallet::preview))
        .route("/contract/read", post(wallet::contract_read))
        .route("/dex/quote", get(dex::quote))
        .route("/dex/swap", post(dex::swap))
        .route("/gas", get(session::gas))
        .route("/chains", get(session::chains))
        .route("/tokens", get(tokens::list_tokens))
        .route("/tokens/info", get(tokens::token_info))
        .route("/tokens/balances", get(tokens::token_balances))
        .route("/tokens/allowance", get(tokens::allowance))
        .route("/tokens/revoke", post(tokens::revoke_approval))
        .route(
            "/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route("/history/stats", get(history::history_stats))
        .route("/notices", get(notices::list_notices))
        .layer(cors)
        .with_state(state)
}

fn build_provider(
    config: &ServiceConfig,
    registry: &ChainRegistry,
) -> anyhow::Result<Option<Arc<dyn WalletProvider>>> {
    match &config.wallet {
        WalletMode::None => {
            warn!("no wallet provider configured; session operations will report not_installed");
            Ok(None)
        }
        WalletMode::Demo => {
            let wallet = InMemoryWallet::new(dd_chains::ETHEREUM);
            let account = wallet.add_account();
            let funds = parse_ether("10")?;
            for chain in registry.chains() {
                wallet.set_balance(chain.id, account, funds);
            }
            info!(%account, "using demo in-memory wallet");
            let provider: Arc<dyn WalletProvider> = Arc::new(wallet);
            Ok(Some(provider))
        }
        WalletMode::Rpc(endpoint) => {
            let wallet = Arc::new(JsonRpcWallet::new(Some(endpoint.clone())));
            wallet.spawn_event_watcher(config.event_poll_interval);
            info!(endpoint = %wallet.endpoint(), "using JSON-RPC wallet");
            let provider: Arc<dyn WalletProvider> = wallet;
            Ok(Some(provider))
        }
    }
}

fn open_history(config: &ServiceConfig) -> anyhow::Result<Arc<dyn TxHistory>> {
    match &config.history_path {
        Some(path) => {
            info!(path = %path, "using RocksDB transaction history");
            Ok(Arc::new(RocksDbTxHistory::open_default(path)?))
        }
        None => Ok(Arc::new(InMemoryTxHistory::default())),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("session-service shutting down");
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "session-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "session-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
            kind: None,
        }),
    )
}

pub(crate) fn unprocessable(message: &str) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: message.to_owned(),
            kind: None,
        }),
    )
}

pub(crate) fn bad_gateway(err: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: None,
        }),
    )
}

pub(crate) fn internal_error(err: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: None,
        }),
    )
}

pub(crate) fn session_error(err: SessionError) -> ApiError {
    let status = match &err {
        SessionError::NotInstalled | SessionError::NotConnected | SessionError::ConnectInProgress => {
            StatusCode::CONFLICT
        }
        SessionError::Locked(_) | SessionError::NoAccounts => StatusCode::UNAUTHORIZED,
        SessionError::ChainNotRegistered(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::TransactionFailed(_)
        | SessionError::SigningFailed(_)
        | SessionError::Provider(_)
        | SessionError::Closed => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: Some(err.kind()),
        }),
    )
}

pub(crate) fn epoch_ms() -> anyhow::Result<u128> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis())
}
