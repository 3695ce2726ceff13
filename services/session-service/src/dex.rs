use alloy_primitives::{Address, U256};
use axum::{
    Json,
    extract::{Query, State},
};
use dd_abi::router::{
    ExactInputSwap, apply_slippage, decode_amounts_out, encode_get_amounts_out,
    encode_swap_exact_tokens_for_eth, encode_swap_exact_tokens_for_tokens,
};
use dd_abi::units::{format_units, parse_units};
use dd_api_types::{SwapQuoteResponse, SwapRequest, SwapResponse, TxKind};
use dd_chains::dex::{router_address, wrapped_native};
use dd_session::SessionError;
use serde::Deserialize;
use tracing::info;

use crate::tokens::{parse_token, token_decimals};
use crate::wallet::record_submission;
use crate::{ApiError, AppState, ApiResult, bad_gateway, bad_request, epoch_ms, internal_error, session_error, unprocessable};

const DEFAULT_SLIPPAGE_PERCENT: f64 = 0.5;
const DEFAULT_DEADLINE_MINUTES: u64 = 20;
const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteQuery {
    pub(crate) token_in: String,
    #[serde(default)]
    pub(crate) token_out: String,
    pub(crate) amount_in: String,
}

/// A resolved route on the connected chain.
struct Route {
    router: Address,
    token_in: Address,
    /// `None` when paying out the native asset.
    token_out: Option<Address>,
    path: Vec<Address>,
}

fn connected_chain(state: &AppState) -> Result<u64, ApiError> {
    state
        .session
        .snapshot()
        .chain_id
        .ok_or_else(|| session_error(SessionError::NotConnected))
}

fn route(chain_id: u64, token_in: &str, token_out: &str) -> Result<Route, ApiError> {
    let token_in = parse_token(token_in)?;
    let token_out = parse_token(token_out)?;
    let router = router_address(chain_id)
        .ok_or_else(|| unprocessable(&format!("swaps are not supported on chain {chain_id}")))?;

    let token_in = match (token_in, token_out) {
        (None, None) => return Err(bad_request("cannot swap the native asset for itself")),
        (None, Some(_)) => return Err(bad_request("wrap the native asset first and swap the wrapped token")),
        (Some(token_in), _) => token_in,
    };
    let last_hop = match token_out {
        Some(token_out) => token_out,
        None => wrapped_native(chain_id)
            .ok_or_else(|| unprocessable(&format!("no wrapped native token on chain {chain_id}")))?,
    };
    if token_in == last_hop {
        return Err(bad_request("token_in and token_out must differ"));
    }

    Ok(Route {
        router,
        token_in,
        token_out,
        path: vec![token_in, last_hop],
    })
}

async fn output_decimals(state: &AppState, route: &Route) -> u8 {
    match route.token_out {
        Some(token) => token_decimals(&state.session, token).await,
        None => NATIVE_DECIMALS,
    }
}

fn parse_amount(raw: &str, decimals: u8) -> Result<U256, ApiError> {
    let amount = parse_units(raw, decimals).map_err(|err| bad_request(&err.to_string()))?;
    if amount.is_zero() {
        return Err(bad_request("amount must be greater than zero"));
    }
    Ok(amount)
}

fn slippage_bps(percent: Option<f64>) -> Result<u32, ApiError> {
    let percent = percent.unwrap_or(DEFAULT_SLIPPAGE_PERCENT);
    if !(0.0..100.0).contains(&percent) {
        return Err(bad_request("slippage_percent must be at least 0 and below 100"));
    }
    Ok((percent * 100.0).floor() as u32)
}

/// Output the router expects for `amount_in` along the route.
async fn quote_out(state: &AppState, route: &Route, amount_in: U256) -> Result<U256, ApiError> {
    let data = state
        .session
        .call(route.router, encode_get_amounts_out(amount_in, &route.path))
        .await
        .map_err(session_error)?;
    decode_amounts_out(&data)
        .map_err(bad_gateway)?
        .last()
        .copied()
        .ok_or_else(|| bad_gateway("router returned no amounts"))
}

pub(crate) async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<SwapQuoteResponse> {
    let route = route(connected_chain(&state)?, &query.token_in, &query.token_out)?;
    let decimals_in = token_decimals(&state.session, route.token_in).await;
    let amount_in = parse_amount(&query.amount_in, decimals_in)?;

    let amount_out = quote_out(&state, &route, amount_in).await?;
    let decimals_out = output_decimals(&state, &route).await;

    Ok(Json(SwapQuoteResponse {
        router: route.router,
        path: route.path,
        amount_in: format_units(amount_in, decimals_in),
        amount_out: format_units(amount_out, decimals_out),
    }))
}

/// Exact-input swap through the chain's router. Raises the router's allowance
/// on `token_in` first when it does not cover `amount_in`.
pub(crate) async fn swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> ApiResult<SwapResponse> {
    let route = route(connected_chain(&state)?, &request.token_in, &request.token_out)?;
    let slippage_bps = slippage_bps(request.slippage_percent)?;
    let deadline_minutes = request.deadline_minutes.unwrap_or(DEFAULT_DEADLINE_MINUTES);
    if deadline_minutes == 0 {
        return Err(bad_request("deadline_minutes must be greater than zero"));
    }

    let signer = state.session.signer().map_err(session_error)?;
    let owner = signer.address();
    let decimals_in = token_decimals(&state.session, route.token_in).await;
    let decimals_out = output_decimals(&state, &route).await;
    let amount_in = parse_amount(&request.amount_in, decimals_in)?;

    let expected_out = match request.amount_out_min.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_units(raw, decimals_out).map_err(|err| bad_request(&err.to_string()))?,
        _ => quote_out(&state, &route, amount_in).await?,
    };
    let amount_out_min = apply_slippage(expected_out, slippage_bps);

    let allowance = state
        .session
        .call(route.token_in, dd_abi::encode_allowance(owner, route.router))
        .await
        .map_err(session_error)?;
    let allowance = dd_abi::decode_uint256(&allowance).map_err(bad_gateway)?;

    let approval = if allowance < amount_in {
        let tx_hash = signer
            .send_transaction(route.token_in, U256::ZERO, dd_abi::encode_approve(route.router, amount_in))
            .await
            .map_err(session_error)?;
        info!(%tx_hash, token = %route.token_in, router = %route.router, "router approval submitted");
        Some(record_submission(&state, owner, tx_hash, Some(route.token_in), U256::ZERO, TxKind::Approval).await)
    } else {
        None
    };

    let now_secs = u64::try_from(epoch_ms().map_err(internal_error)? / 1000).map_err(internal_error)?;
    let deadline = now_secs.saturating_add(deadline_minutes.saturating_mul(60));
    let call = ExactInputSwap {
        amount_in,
        amount_out_min,
        path: route.path.clone(),
        recipient: owner,
        deadline,
    };
    let data = match route.token_out {
        Some(_) => encode_swap_exact_tokens_for_tokens(&call),
        None => encode_swap_exact_tokens_for_eth(&call),
    };

    let tx_hash = signer
        .send_transaction(route.router, U256::ZERO, data)
        .await
        .map_err(session_error)?;
    info!(%tx_hash, router = %route.router, %amount_in, %amount_out_min, "swap submitted");
    let swap = record_submission(&state, owner, tx_hash, Some(route.router), U256::ZERO, TxKind::ContractCall).await;

    Ok(Json(SwapResponse {
        router: route.router,
        path: route.path,
        amount_in: format_units(amount_in, decimals_in),
        amount_out_min: format_units(amount_out_min, decimals_out),
        deadline,
        approval,
        swap,
    }))
}
