use axum::{Json, extract::State};
use dd_abi::units::format_gwei;
use dd_api_types::{ChainSummary, GasResponse, SessionSnapshot, SwitchChainRequest};
use dd_session::classify_gas_price_wei;
use tracing::info;

use crate::{AppState, ApiResult, session_error};

pub(crate) async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

pub(crate) async fn connect(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    let snapshot = state.session.connect().await.map_err(session_error)?;
    info!(account = ?snapshot.account, chain_id = ?snapshot.chain_id, "session connected");
    Ok(Json(snapshot))
}

pub(crate) async fn disconnect(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    let snapshot = state.session.disconnect().await.map_err(session_error)?;
    Ok(Json(snapshot))
}

pub(crate) async fn switch_chain(
    State(state): State<AppState>,
    Json(request): Json<SwitchChainRequest>,
) -> ApiResult<SessionSnapshot> {
    let snapshot = state
        .session
        .switch_chain(request.chain_id)
        .await
        .map_err(session_error)?;
    Ok(Json(snapshot))
}

/// Current fee rates in gwei and how expensive they are.
pub(crate) async fn gas(State(state): State<AppState>) -> ApiResult<GasResponse> {
    let fees = state.session.fee_data().await.map_err(session_error)?;
    Ok(Json(GasResponse {
        chain_id: state.session.snapshot().chain_id,
        gas_price: fees.gas_price.map(format_gwei),
        max_fee_per_gas: fees.max_fee_per_gas.map(format_gwei),
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas.map(format_gwei),
        level: classify_gas_price_wei(fees.gas_price),
    }))
}

pub(crate) async fn chains(State(state): State<AppState>) -> Json<Vec<ChainSummary>> {
    Json(state.session.registry().summaries())
}
