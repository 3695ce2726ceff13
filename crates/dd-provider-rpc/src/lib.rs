use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256, hex};
use async_trait::async_trait;
use dd_provider::{FeeData, ProviderError, ProviderEvent, TxReceipt, TxRequest, WalletProvider, codes};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Wallet provider that forwards EIP-1193 methods as JSON-RPC 2.0 over HTTP.
///
/// Reads `DAPPDOCK_WALLET_RPC_URL` from environment at construction time
/// (default: `http://localhost:8545`). HTTP carries no push notifications, so
/// account and chain changes are synthesized by [`JsonRpcWallet::spawn_event_watcher`].
pub struct JsonRpcWallet {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    events: broadcast::Sender<ProviderEvent>,
}

impl Default for JsonRpcWallet {
    fn default() -> Self {
        Self::new(None)
    }
}

impl JsonRpcWallet {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("DAPPDOCK_WALLET_RPC_URL").ok())
            .unwrap_or_else(|| "http://localhost:8545".to_string());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Polls `eth_accounts` and `eth_chainId`, emitting an event whenever either differs
    /// from the previous poll. The task ends once the wallet is dropped.
    pub fn spawn_event_watcher(self: &Arc<Self>, poll_interval: Duration) -> JoinHandle<()> {
        let wallet = Arc::downgrade(self);
        info!(endpoint = %self.endpoint, ?poll_interval, "starting wallet event watcher");
        tokio::spawn(watch_events(wallet, poll_interval))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(format!("{method}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("{method} HTTP {status}: {text}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(format!("{method}: {err}")))?;

        if let Some(error) = body.error {
            return Err(ProviderError::rpc(error.code, error.message));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    async fn request_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ProviderError> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|err| ProviderError::InvalidResponse(format!("{method}: {err}")))
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256, ProviderError> {
        let raw: String = self.request_as(method, params).await?;
        parse_quantity(&raw)
    }
}

// ── JSON-RPC wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct TransactionObject {
    from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<Address>,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<String>,
}

impl From<&TxRequest> for TransactionObject {
    fn from(tx: &TxRequest) -> Self {
        Self {
            from: tx.from,
            to: tx.to,
            value: format!("0x{:x}", tx.value),
            data: (!tx.data.is_empty()).then(|| tx.data.clone()),
            gas: tx.gas.map(|gas| format!("0x{gas:x}")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockObject {
    #[serde(default)]
    base_fee_per_gas: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptObject {
    transaction_hash: B256,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

fn parse_quantity(raw: &str) -> Result<U256, ProviderError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::InvalidResponse(format!("quantity without 0x prefix: {raw}")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|err| ProviderError::InvalidResponse(format!("invalid quantity {raw}: {err}")))
}

fn narrow<T: TryFrom<U256>>(value: U256) -> Result<T, ProviderError> {
    T::try_from(value).map_err(|_| ProviderError::InvalidResponse(format!("quantity {value} out of range")))
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    fn name(&self) -> &str {
        "json-rpc"
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match self.request_as("eth_requestAccounts", json!([])).await {
            Err(err) if err.code() == Some(codes::METHOD_NOT_FOUND) => {
                // Plain nodes expose unlocked accounts without an authorization prompt.
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.accounts().await
            }
            other => other,
        }
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_as("eth_accounts", json!([])).await
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        narrow(self.quantity("eth_chainId", json!([])).await?)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": format!("0x{chain_id:x}") }]),
        )
        .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.quantity("eth_getBalance", json!([address, "latest"])).await
    }

    async fn fee_data(&self) -> Result<FeeData, ProviderError> {
        let gas_price: u128 = narrow(self.quantity("eth_gasPrice", json!([])).await?)?;

        let priority = match self.quantity("eth_maxPriorityFeePerGas", json!([])).await {
            Ok(value) => Some(narrow::<u128>(value)?),
            Err(err) => {
                debug!(error = %err, "eth_maxPriorityFeePerGas unavailable");
                None
            }
        };

        let block: Option<BlockObject> = match self
            .request_as("eth_getBlockByNumber", json!(["latest", false]))
            .await
        {
            Ok(block) => block,
            Err(err) => {
                debug!(error = %err, "latest block unavailable, skipping EIP-1559 fees");
                None
            }
        };
        let base_fee = match block.and_then(|block| block.base_fee_per_gas) {
            Some(raw) => Some(narrow::<u128>(parse_quantity(&raw)?)?),
            None => None,
        };

        let (max_fee_per_gas, max_priority_fee_per_gas) = match (base_fee, priority) {
            (Some(base_fee), Some(priority)) => {
                (Some(base_fee.saturating_mul(2).saturating_add(priority)), Some(priority))
            }
            _ => (None, None),
        };

        Ok(FeeData {
            gas_price: Some(gas_price),
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, ProviderError> {
        let object = TransactionObject::from(tx);
        narrow(self.quantity("eth_estimateGas", json!([object])).await?)
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256, ProviderError> {
        let object = TransactionObject::from(&tx);
        self.request_as("eth_sendTransaction", json!([object])).await
    }

    async fn sign_message(&self, address: Address, message: &[u8]) -> Result<Bytes, ProviderError> {
        let payload = format!("0x{}", hex::encode(message));
        self.request_as("personal_sign", json!([payload, address])).await
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ProviderError> {
        let object = TransactionObject::from(tx);
        self.request_as("eth_call", json!([object, "latest"])).await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ProviderError> {
        let receipt: Option<ReceiptObject> = self
            .request_as("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };
        let block_number = match receipt.block_number {
            Some(raw) => Some(narrow::<u64>(parse_quantity(&raw)?)?),
            None => None,
        };
        let success = match receipt.status {
            Some(raw) => parse_quantity(&raw)? == U256::from(1),
            None => true,
        };

        Ok(Some(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number,
            success,
        }))
    }
}

// ── Event watcher ───────────────────────────────────────────────────

#[derive(Default)]
struct Observed {
    accounts: Option<Vec<Address>>,
    chain_id: Option<u64>,
}

async fn watch_events(wallet: Weak<JsonRpcWallet>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut observed = Observed::default();

    loop {
        ticker.tick().await;
        let Some(wallet) = wallet.upgrade() else {
            debug!("wallet dropped, stopping event watcher");
            break;
        };

        match wallet.accounts().await {
            Ok(accounts) => {
                if observed.accounts.as_ref() != Some(&accounts) {
                    if observed.accounts.is_some() {
                        let _ = wallet.events.send(ProviderEvent::AccountsChanged(accounts.clone()));
                    }
                    observed.accounts = Some(accounts);
                }
            }
            Err(err) => warn!(error = %err, "eth_accounts poll failed"),
        }

        match wallet.chain_id().await {
            Ok(chain_id) => {
                if observed.chain_id != Some(chain_id) {
                    if observed.chain_id.is_some() {
                        let _ = wallet
                            .events
                            .send(ProviderEvent::ChainChanged(format!("0x{chain_id:x}")));
                    }
                    observed.chain_id = Some(chain_id);
                }
            }
            Err(err) => warn!(error = %err, "eth_chainId poll failed"),
        }
    }
}
