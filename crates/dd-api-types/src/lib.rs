use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time view of the wallet session, published on every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub chain_name: Option<String>,
    pub balance: Option<String>,
    pub native_symbol: Option<String>,
    pub is_connecting: bool,
    pub last_error: Option<String>,
    pub manually_disconnected: bool,
    pub provider_installed: bool,
    /// Generation of the provider/signer handles backing this session.
    pub generation: Option<u64>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecodedCall {
    pub name: String,
    pub params: Vec<DecodedParam>,
}

pub const UNKNOWN_FUNCTION: &str = "Unknown Function";

impl DecodedCall {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_FUNCTION.to_owned(),
            params: Vec::new(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.name != UNKNOWN_FUNCTION
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GasEstimate {
    Estimated { gas: u64 },
    Unavailable,
    NotRequested,
}

impl std::fmt::Display for GasEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Estimated { gas } => write!(f, "{gas}"),
            Self::Unavailable => f.write_str("Unable to estimate"),
            Self::NotRequested => f.write_str("N/A"),
        }
    }
}

/// Human-readable preview of a transaction before it is handed to the wallet.
///
/// Fee figures are denominated in gwei, `value` in ether.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionPreview {
    pub to: Option<Address>,
    pub value: String,
    pub data: String,
    pub chain_id: Option<u64>,
    pub is_contract: bool,
    pub has_data: bool,
    pub function: Option<DecodedCall>,
    pub gas_limit: GasEstimate,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
    pub estimated_cost: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GasLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl GasLevel {
    /// Low below 20 gwei, High from 50 gwei.
    pub fn classify(gwei: Option<f64>) -> Self {
        match gwei {
            None => Self::Unknown,
            Some(price) if price < 20.0 => Self::Low,
            Some(price) if price < 50.0 => Self::Medium,
            Some(_) => Self::High,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Transfer,
    ContractCall,
    Approval,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxRecord {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: String,
    pub chain_id: Option<u64>,
    pub kind: TxKind,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub timestamp_epoch_ms: u128,
}

// ── HTTP request / response bodies ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchChainRequest {
    pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeTransferRequest {
    pub to: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTransactionRequest {
    pub to: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    /// ERC-20 function name, an alternative to raw `data`.
    #[serde(default)]
    pub function: Option<String>,
    /// Comma-separated arguments for `function`.
    #[serde(default)]
    pub params: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxSubmitResponse {
    pub tx_hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: String,
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMessageRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMessageResponse {
    pub address: Address,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractReadRequest {
    pub to: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub params: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractReadResponse {
    pub result: String,
    /// Return value rendered by type when the call was made by function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasResponse {
    pub chain_id: Option<u64>,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
    pub level: GasLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCurrencyInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSummary {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub rpc_url: String,
    pub native_currency: NativeCurrencyInfo,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSummary {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub address: Address,
    pub balance: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalancesResponse {
    pub account: Address,
    pub chain_id: u64,
    pub native: Option<String>,
    pub tokens: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub allowance: String,
    pub raw_allowance: String,
    pub has_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeApprovalRequest {
    pub token: String,
    pub spender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfoResponse {
    /// `None` for the chain's native asset.
    pub address: Option<Address>,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// Exact-input swap through the chain's router. An empty or zero
/// `token_out` swaps into the native asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    pub token_in: String,
    #[serde(default)]
    pub token_out: String,
    /// Decimal amount in `token_in` units.
    pub amount_in: String,
    /// Expected output in `token_out` units before slippage; quoted from the router when absent.
    #[serde(default)]
    pub amount_out_min: Option<String>,
    #[serde(default)]
    pub slippage_percent: Option<f64>,
    #[serde(default)]
    pub deadline_minutes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapQuoteResponse {
    pub router: Address,
    pub path: Vec<Address>,
    pub amount_in: String,
    pub amount_out: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponse {
    pub router: Address,
    pub path: Vec<Address>,
    pub amount_in: String,
    pub amount_out_min: String,
    pub deadline: u64,
    /// Present when the router's allowance had to be raised first.
    pub approval: Option<TxSubmitResponse>,
    pub swap: TxSubmitResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub transactions: Vec<TxRecord>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatsWindow {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl StatsWindow {
    pub fn as_millis(self) -> u128 {
        const DAY_MS: u128 = 24 * 60 * 60 * 1000;
        match self {
            StatsWindow::Day => DAY_MS,
            StatsWindow::Week => 7 * DAY_MS,
            StatsWindow::Month => 30 * DAY_MS,
            StatsWindow::Quarter => 90 * DAY_MS,
        }
    }
}

/// Aggregates over the transactions submitted within a window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryStats {
    pub window: StatsWindow,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
    /// Percentage of `total` that confirmed, 0 when there were none.
    pub success_rate: f64,
    /// Sum of native values, in ether.
    pub total_value: String,
    pub average_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticesResponse {
    pub notices: Vec<Notice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_estimate_serializes_with_status_tag() {
        let json = serde_json::to_value(GasEstimate::Estimated { gas: 21_000 }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "estimated", "gas": 21000 }));
        assert_eq!(GasEstimate::Unavailable.to_string(), "Unable to estimate");
    }

    #[test]
    fn unknown_call_is_not_known() {
        assert!(!DecodedCall::unknown().is_known());
    }

    #[test]
    fn snapshot_reports_connection_from_account() {
        let mut snapshot = SessionSnapshot::default();
        assert!(!snapshot.is_connected());
        snapshot.account = Some(Address::repeat_byte(0xab));
        assert!(snapshot.is_connected());
    }

    #[test]
    fn stats_window_uses_short_labels() {
        let window: StatsWindow = serde_json::from_value(serde_json::json!("7d")).unwrap();
        assert_eq!(window, StatsWindow::Week);
        assert_eq!(serde_json::to_value(StatsWindow::Day).unwrap(), serde_json::json!("24h"));
        assert_eq!(StatsWindow::Month.as_millis(), 30 * StatsWindow::Day.as_millis());
        assert!(serde_json::from_value::<StatsWindow>(serde_json::json!("1y")).is_err());
    }
}
