use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{B256, U256};
use axum::{
    Json,
    extract::{Query, State},
};
use dd_abi::units::{format_ether, parse_ether};
use dd_api_types::{HistoryResponse, HistoryStats, StatsWindow, TxRecord, TxStatus};
use dd_session::SessionHandle;
use dd_storage::TxHistory;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{AppState, ApiResult, bad_request, epoch_ms, internal_error};

/// Polls stop after this many attempts without a receipt.
const MAX_RECEIPT_POLLS: u32 = 150;

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    pub(crate) account: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsQuery {
    pub(crate) account: Option<String>,
    #[serde(default)]
    pub(crate) window: StatsWindow,
}

async fn records_for(state: &AppState, account: Option<&str>) -> Result<Vec<TxRecord>, crate::ApiError> {
    match account.map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            let account = dd_abi::parse_address(raw).map_err(|err| bad_request(&err.to_string()))?;
            state
                .history
                .list_by_account(account)
                .await
                .map_err(internal_error)
        }
        _ => state.history.list_all().await.map_err(internal_error),
    }
}

pub(crate) async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let transactions = records_for(&state, query.account.as_deref()).await?;
    Ok(Json(HistoryResponse { transactions }))
}

/// Counts and native value totals over the records submitted within `window`.
pub(crate) async fn history_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<HistoryStats> {
    let records = records_for(&state, query.account.as_deref()).await?;
    let now_ms = epoch_ms().map_err(internal_error)?;
    Ok(Json(summarize(&records, query.window, now_ms)))
}

pub(crate) fn summarize(records: &[TxRecord], window: StatsWindow, now_ms: u128) -> HistoryStats {
    let since = now_ms.saturating_sub(window.as_millis());
    let in_window: Vec<&TxRecord> = records
        .iter()
        .filter(|record| record.timestamp_epoch_ms >= since)
        .collect();

    let count = |status: TxStatus| in_window.iter().filter(|record| record.status == status).count();
    let total = in_window.len();
    let successful = count(TxStatus::Confirmed);

    let total_value = in_window
        .iter()
        .filter_map(|record| match parse_ether(&record.value) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(hash = %record.hash, error = %err, "skipping unparsable value");
                None
            }
        })
        .fold(U256::ZERO, |sum, value| sum.saturating_add(value));
    let average_value = match total {
        0 => U256::ZERO,
        n => total_value / U256::from(n),
    };

    HistoryStats {
        window,
        total,
        successful,
        failed: count(TxStatus::Failed),
        pending: count(TxStatus::Pending),
        success_rate: match total {
            0 => 0.0,
            n => (successful as f64 / n as f64 * 1000.0).round() / 10.0,
        },
        total_value: format_ether(total_value),
        average_value: format_ether(average_value),
    }
}

pub(crate) async fn clear_history(State(state): State<AppState>) -> ApiResult<HistoryResponse> {
    state.history.clear().await.map_err(internal_error)?;
    info!("transaction history cleared");
    Ok(Json(HistoryResponse {
        transactions: Vec::new(),
    }))
}

/// Watches for the receipt of a submitted transaction and flips its history
/// record to `confirmed` or `failed`.
pub(crate) fn spawn_receipt_watcher(
    session: SessionHandle,
    history: Arc<dyn TxHistory>,
    tx_hash: B256,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for _ in 0..MAX_RECEIPT_POLLS {
            ticker.tick().await;

            let receipt = match session.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%tx_hash, error = %err, "receipt lookup failed");
                    continue;
                }
            };

            let status = if receipt.success {
                TxStatus::Confirmed
            } else {
                TxStatus::Failed
            };
            match history
                .update_status(tx_hash, status, receipt.block_number)
                .await
            {
                Ok(Some(_)) => info!(%tx_hash, ?status, block = ?receipt.block_number, "transaction settled"),
                Ok(None) => warn!(%tx_hash, "settled transaction is no longer in history"),
                Err(err) => warn!(%tx_hash, error = %err, "failed to update transaction status"),
            }
            return;
        }

        warn!(%tx_hash, "gave up waiting for transaction receipt");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use dd_api_types::TxKind;

    const HOUR_MS: u128 = 60 * 60 * 1000;
    const NOW_MS: u128 = 1_000 * 24 * HOUR_MS;

    fn record(byte: u8, value: &str, status: TxStatus, age_ms: u128) -> TxRecord {
        TxRecord {
            hash: B256::repeat_byte(byte),
            from: Address::repeat_byte(0xaa),
            to: Some(Address::repeat_byte(0xbb)),
            value: value.to_owned(),
            chain_id: Some(1),
            kind: TxKind::Transfer,
            status,
            block_number: None,
            timestamp_epoch_ms: NOW_MS - age_ms,
        }
    }

    #[test]
    fn stats_cover_only_the_requested_window() {
        let records = vec![
            record(1, "1.5", TxStatus::Confirmed, HOUR_MS),
            record(2, "0.5", TxStatus::Failed, 2 * HOUR_MS),
            record(3, "1.0", TxStatus::Pending, 3 * 24 * HOUR_MS),
            record(4, "100.0", TxStatus::Confirmed, 40 * 24 * HOUR_MS),
        ];

        let day = summarize(&records, StatsWindow::Day, NOW_MS);
        assert_eq!((day.total, day.successful, day.failed, day.pending), (2, 1, 1, 0));
        assert_eq!(day.total_value, "2.0");
        assert_eq!(day.average_value, "1.0");
        assert_eq!(day.success_rate, 50.0);

        let week = summarize(&records, StatsWindow::Week, NOW_MS);
        assert_eq!((week.total, week.pending), (3, 1));
        assert_eq!(week.total_value, "3.0");
        assert_eq!(week.success_rate, 33.3);

        assert_eq!(summarize(&records, StatsWindow::Quarter, NOW_MS).total, 4);
    }

    #[test]
    fn empty_history_has_zero_stats() {
        let stats = summarize(&[], StatsWindow::Month, NOW_MS);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.total_value, "0.0");
        assert_eq!(stats.average_value, "0.0");
    }
}
