use alloy_primitives::{Address, B256, Bytes, U256, hex};
use axum::{Json, extract::State};
use dd_abi::units::{format_ether, parse_ether};
use dd_api_types::{
    ContractReadRequest, ContractReadResponse, ContractTransactionRequest, NativeTransferRequest,
    SignMessageRequest, SignMessageResponse, TransactionPreview, TxKind, TxRecord, TxStatus,
    TxSubmitResponse,
};
use dd_session::PendingTransaction;
use tracing::{debug, info, warn};

use crate::history::spawn_receipt_watcher;
use crate::{ApiError, AppState, ApiResult, bad_request, epoch_ms, session_error};

pub(crate) async fn send_native(
    State(state): State<AppState>,
    Json(request): Json<NativeTransferRequest>,
) -> ApiResult<TxSubmitResponse> {
    let to = dd_abi::parse_address(&request.to).map_err(|err| bad_request(&err.to_string()))?;
    parse_ether(&request.amount).map_err(|err| bad_request(&err.to_string()))?;

    let transfer = state
        .session
        .send_native_transfer(to, &request.amount)
        .await
        .map_err(session_error)?;

    Ok(Json(
        record_submission(
            &state,
            transfer.from,
            transfer.tx_hash,
            Some(transfer.to),
            transfer.value,
            TxKind::Transfer,
        )
        .await,
    ))
}

pub(crate) async fn send_transaction(
    State(state): State<AppState>,
    Json(request): Json<ContractTransactionRequest>,
) -> ApiResult<TxSubmitResponse> {
    let tx = pending_transaction(&request)?;
    let to = tx.to.ok_or_else(|| bad_request("to is required"))?;

    let signer = state.session.signer().map_err(session_error)?;
    let tx_hash = signer
        .send_transaction(to, tx.value, tx.data.clone())
        .await
        .map_err(session_error)?;

    let kind = classify(&tx.data);
    Ok(Json(
        record_submission(&state, signer.address(), tx_hash, Some(to), tx.value, kind).await,
    ))
}

pub(crate) async fn sign_message(
    State(state): State<AppState>,
    Json(request): Json<SignMessageRequest>,
) -> ApiResult<SignMessageResponse> {
    if request.message.is_empty() {
        return Err(bad_request("message cannot be empty"));
    }

    let signer = state.session.signer().map_err(session_error)?;
    let signature = signer
        .sign_message(&request.message)
        .await
        .map_err(session_error)?;

    Ok(Json(SignMessageResponse {
        address: signer.address(),
        signature: hex::encode_prefixed(&signature),
    }))
}

pub(crate) async fn preview(
    State(state): State<AppState>,
    Json(request): Json<ContractTransactionRequest>,
) -> ApiResult<TransactionPreview> {
    let tx = pending_transaction(&request)?;
    let preview = state
        .session
        .preview_transaction(&tx)
        .await
        .map_err(session_error)?;
    Ok(Json(preview))
}

pub(crate) async fn contract_read(
    State(state): State<AppState>,
    Json(request): Json<ContractReadRequest>,
) -> ApiResult<ContractReadResponse> {
    let to = dd_abi::parse_address(&request.to).map_err(|err| bad_request(&err.to_string()))?;
    let function = non_blank(request.function.as_deref());
    if non_blank(request.data.as_deref()).is_none() && function.is_none() {
        return Err(bad_request("data or function is required"));
    }
    let data = call_data(
        request.data.as_deref(),
        function,
        request.params.as_deref(),
    )?;

    let result = state.session.call(to, data).await.map_err(session_error)?;
    let decoded = function.and_then(|function| match dd_abi::decode_named_return(function, &result) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            debug!(%to, function, error = %err, "return value did not decode");
            None
        }
    });
    Ok(Json(ContractReadResponse {
        result: hex::encode_prefixed(&result),
        decoded,
    }))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Raw hex `data`, or calldata built from an ERC-20 `function` and its
/// comma-separated `params`. Giving both is rejected.
fn call_data(data: Option<&str>, function: Option<&str>, params: Option<&str>) -> Result<Bytes, ApiError> {
    match (non_blank(data), non_blank(function)) {
        (Some(_), Some(_)) => Err(bad_request("pass either data or function, not both")),
        (Some(raw), None) => dd_abi::parse_call_data(raw).map_err(|err| bad_request(&err.to_string())),
        (None, Some(function)) => {
            let args = dd_abi::split_args(params.unwrap_or_default());
            dd_abi::encode_named_call(function, &args).map_err(|err| bad_request(&err.to_string()))
        }
        (None, None) => Ok(Bytes::new()),
    }
}

/// An empty `to` describes a contract deployment, which only the preview accepts.
fn pending_transaction(
    request: &ContractTransactionRequest,
) -> Result<PendingTransaction, ApiError> {
    let to = match request.to.trim() {
        "" => None,
        raw => Some(dd_abi::parse_address(raw).map_err(|err| bad_request(&err.to_string()))?),
    };
    let value = match request.value.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_ether(raw).map_err(|err| bad_request(&err.to_string()))?,
        _ => U256::ZERO,
    };
    let data = call_data(
        request.data.as_deref(),
        request.function.as_deref(),
        request.params.as_deref(),
    )?;
    Ok(PendingTransaction { to, value, data })
}

fn classify(data: &[u8]) -> TxKind {
    if data.is_empty() {
        return TxKind::Transfer;
    }
    match dd_abi::decode_known_call(data) {
        Some(call) if call.name == "approve" => TxKind::Approval,
        _ => TxKind::ContractCall,
    }
}

/// Stores a pending history record for a submitted transaction and starts
/// watching for its receipt. History failures are logged, not surfaced.
pub(crate) async fn record_submission(
    state: &AppState,
    from: Address,
    tx_hash: B256,
    to: Option<Address>,
    value: U256,
    kind: TxKind,
) -> TxSubmitResponse {
    let chain_id = state.session.snapshot().chain_id;
    let value = format_ether(value);
    info!(%tx_hash, %from, ?kind, "transaction submitted");

    let timestamp_epoch_ms = epoch_ms().unwrap_or_default();
    let record = TxRecord {
        hash: tx_hash,
        from,
        to,
        value: value.clone(),
        chain_id,
        kind,
        status: TxStatus::Pending,
        block_number: None,
        timestamp_epoch_ms,
    };
    match state.history.add(record).await {
        Ok(()) => {
            spawn_receipt_watcher(
                state.session.clone(),
                state.history.clone(),
                tx_hash,
                state.receipt_poll_interval,
            );
        }
        Err(err) => warn!(%tx_hash, error = %err, "failed to record transaction"),
    }

    TxSubmitResponse {
        tx_hash,
        from,
        to,
        value,
        chain_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_submitted_call_data() {
        let spender = Address::repeat_byte(0x11);
        assert_eq!(classify(&[]), TxKind::Transfer);
        assert_eq!(
            classify(&dd_abi::encode_approve(spender, U256::ZERO)),
            TxKind::Approval
        );
        assert_eq!(
            classify(&dd_abi::encode_transfer(spender, U256::from(1))),
            TxKind::ContractCall
        );
        assert_eq!(classify(&[0xde, 0xad, 0xbe, 0xef]), TxKind::ContractCall);
    }

    #[test]
    fn call_data_comes_from_hex_or_function_name() {
        let spender = Address::repeat_byte(0x11);
        let by_name = call_data(None, Some("approve"), Some(&format!("{spender},0"))).unwrap();
        assert_eq!(by_name, dd_abi::encode_approve(spender, U256::ZERO));
        assert_eq!(call_data(Some("0x"), None, None).unwrap(), Bytes::new());
        assert_eq!(call_data(Some(" "), Some(""), None).unwrap(), Bytes::new());

        let (status, _) = call_data(Some("0x095ea7b3"), Some("approve"), None).unwrap_err();
        assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
        let (status, _) = call_data(None, Some("mint"), None).unwrap_err();
        assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    }
}
