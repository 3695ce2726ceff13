use alloy_primitives::{Address, U256};
use axum::{
    Json,
    extract::{Query, State},
};
use dd_abi::units::format_units;
use dd_api_types::{
    AllowanceResponse, RevokeApprovalRequest, TokenBalance, TokenBalancesResponse, TokenInfoResponse,
    TokenSummary, TxKind, TxSubmitResponse,
};
use dd_chains::tokens::tokens_for_chain;
use dd_session::{SessionError, SessionHandle};
use serde::Deserialize;
use tracing::debug;

use crate::wallet::record_submission;
use crate::{ApiError, AppState, ApiResult, bad_gateway, bad_request, session_error};

const FALLBACK_DECIMALS: u8 = 18;

#[derive(Debug, Deserialize)]
pub(crate) struct TokenListQuery {
    pub(crate) chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenInfoQuery {
    #[serde(default)]
    pub(crate) address: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AllowanceQuery {
    pub(crate) token: String,
    pub(crate) spender: String,
}

/// Well-known tokens on `chain_id`, else on the connected chain, else on the default chain.
pub(crate) async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<TokenListQuery>,
) -> Json<Vec<TokenSummary>> {
    let chain_id = query
        .chain_id
        .or(state.session.snapshot().chain_id)
        .unwrap_or_else(|| state.session.registry().default_chain_id());
    Json(tokens_for_chain(chain_id))
}

pub(crate) async fn token_balances(State(state): State<AppState>) -> ApiResult<TokenBalancesResponse> {
    let signer = state.session.signer().map_err(session_error)?;
    let snapshot = state.session.snapshot();
    let chain_id = snapshot
        .chain_id
        .ok_or_else(|| session_error(SessionError::NotConnected))?;

    let mut tokens = Vec::new();
    for token in tokens_for_chain(chain_id) {
        let balance = match state
            .session
            .call(token.address, dd_abi::encode_balance_of(signer.address()))
            .await
        {
            Ok(data) => dd_abi::decode_uint256(&data).map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };

        tokens.push(match balance {
            Ok(raw) => TokenBalance {
                symbol: token.symbol,
                address: token.address,
                balance: Some(format_units(raw, token.decimals)),
                error: None,
            },
            Err(err) => {
                debug!(token = %token.address, error = %err, "token balance unavailable");
                TokenBalance {
                    symbol: token.symbol,
                    address: token.address,
                    balance: None,
                    error: Some(err),
                }
            }
        });
    }

    Ok(Json(TokenBalancesResponse {
        account: signer.address(),
        chain_id,
        native: snapshot.balance,
        tokens,
    }))
}

pub(crate) async fn allowance(
    State(state): State<AppState>,
    Query(query): Query<AllowanceQuery>,
) -> ApiResult<AllowanceResponse> {
    let token = dd_abi::parse_address(&query.token).map_err(|err| bad_request(&err.to_string()))?;
    let spender = dd_abi::parse_address(&query.spender).map_err(|err| bad_request(&err.to_string()))?;

    let owner = state.session.signer().map_err(session_error)?.address();
    let data = state
        .session
        .call(token, dd_abi::encode_allowance(owner, spender))
        .await
        .map_err(session_error)?;
    let raw = dd_abi::decode_uint256(&data).map_err(bad_gateway)?;
    let decimals = token_decimals(&state.session, token).await;

    Ok(Json(AllowanceResponse {
        token,
        owner,
        spender,
        allowance: format_units(raw, decimals),
        raw_allowance: raw.to_string(),
        has_approval: !raw.is_zero(),
    }))
}

/// Resets the spender's allowance to zero with `approve(spender, 0)`.
pub(crate) async fn revoke_approval(
    State(state): State<AppState>,
    Json(request): Json<RevokeApprovalRequest>,
) -> ApiResult<TxSubmitResponse> {
    let token = dd_abi::parse_address(&request.token).map_err(|err| bad_request(&err.to_string()))?;
    let spender = dd_abi::parse_address(&request.spender).map_err(|err| bad_request(&err.to_string()))?;

    let signer = state.session.signer().map_err(session_error)?;
    let tx_hash = signer
        .send_transaction(token, U256::ZERO, dd_abi::encode_approve(spender, U256::ZERO))
        .await
        .map_err(session_error)?;

    Ok(Json(
        record_submission(&state, signer.address(), tx_hash, Some(token), U256::ZERO, TxKind::Approval).await,
    ))
}

/// Symbol, name and decimals read from the token contract. A blank or zero
/// address describes the connected chain's native asset.
pub(crate) async fn token_info(
    State(state): State<AppState>,
    Query(query): Query<TokenInfoQuery>,
) -> ApiResult<TokenInfoResponse> {
    let token = parse_token(&query.address)?;
    let Some(token) = token else {
        let chain_id = state
            .session
            .snapshot()
            .chain_id
            .unwrap_or_else(|| state.session.registry().default_chain_id());
        let native = state.session.registry().native_currency(chain_id);
        return Ok(Json(TokenInfoResponse {
            address: None,
            symbol: native.symbol,
            name: native.name,
            decimals: native.decimals,
        }));
    };

    let symbol = state
        .session
        .call(token, dd_abi::encode_symbol())
        .await
        .map_err(session_error)?;
    let name = state
        .session
        .call(token, dd_abi::encode_name())
        .await
        .map_err(session_error)?;
    let decimals = state
        .session
        .call(token, dd_abi::encode_decimals())
        .await
        .map_err(session_error)?;

    Ok(Json(TokenInfoResponse {
        address: Some(token),
        symbol: dd_abi::decode_string(&symbol).map_err(bad_gateway)?,
        name: dd_abi::decode_string(&name).map_err(bad_gateway)?,
        decimals: dd_abi::decode_uint8(&decimals).map_err(bad_gateway)?,
    }))
}

/// `None` for a blank or zero address, which stands for the native asset.
pub(crate) fn parse_token(raw: &str) -> Result<Option<Address>, ApiError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let address = dd_abi::parse_address(raw).map_err(|err| bad_request(&err.to_string()))?;
    Ok((!address.is_zero()).then_some(address))
}

/// Decimals from the token list, else from `decimals()`, else 18.
pub(crate) async fn token_decimals(session: &SessionHandle, token: Address) -> u8 {
    let chain_id = session
        .snapshot()
        .chain_id
        .unwrap_or_else(|| session.registry().default_chain_id());
    if let Some(known) = tokens_for_chain(chain_id)
        .into_iter()
        .find(|known| known.address == token)
    {
        return known.decimals;
    }

    match session.call(token, dd_abi::encode_decimals()).await {
        Ok(data) => dd_abi::decode_uint8(&data).unwrap_or(FALLBACK_DECIMALS),
        Err(err) => {
            debug!(%token, error = %err, "decimals() unavailable");
            FALLBACK_DECIMALS
        }
    }
}
