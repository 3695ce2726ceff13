//! A scriptable stand-in for a browser-extension wallet.
//!
//! Holds real secp256k1 keys so signatures verify, keeps per-chain native
//! balances, and lets callers fire the same account/chain notifications a
//! wallet extension would when the user acts inside the extension UI.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use async_trait::async_trait;
use dd_crypto::{LocalSigner, Signer};
use tokio::sync::{Notify, broadcast};
use tracing::debug;

use crate::{FeeData, ProviderError, ProviderEvent, TxReceipt, TxRequest, WalletProvider, codes};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_CHAINS: [u64; 5] = [1, 11_155_111, 137, 8453, 84_532];

/// Number of times each provider method was invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub request_accounts: usize,
    pub accounts: usize,
    pub chain_id: usize,
    pub switch_chain: usize,
    pub switch_targets: Vec<u64>,
    pub get_balance: usize,
    pub fee_data: usize,
    pub estimate_gas: usize,
    pub send_transaction: usize,
    pub sign_message: usize,
    pub call: usize,
    pub transaction_receipt: usize,
}

struct WalletState {
    signers: Vec<LocalSigner>,
    authorized: Vec<Address>,
    locked: bool,
    reject_requests: bool,
    chain_id: u64,
    known_chains: BTreeSet<u64>,
    balances: HashMap<(u64, Address), U256>,
    nonce: u64,
    gas_estimate: Option<u64>,
    fee_data: Option<FeeData>,
    balance_failure: bool,
    send_failure: Option<ProviderError>,
    call_responses: HashMap<Address, Bytes>,
    selector_responses: HashMap<(Address, [u8; 4]), Bytes>,
    receipts: HashMap<B256, TxReceipt>,
    sent: Vec<TxRequest>,
    calls: CallCounts,
}

pub struct InMemoryWallet {
    state: Mutex<WalletState>,
    events: broadcast::Sender<ProviderEvent>,
    authorization_gate: Notify,
    hold_authorization: AtomicBool,
    account_read_gate: Notify,
    hold_account_reads: AtomicBool,
}

impl InMemoryWallet {
    pub fn new(chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(WalletState {
                signers: Vec::new(),
                authorized: Vec::new(),
                locked: false,
                reject_requests: false,
                chain_id,
                known_chains: DEFAULT_CHAINS.into_iter().chain([chain_id]).collect(),
                balances: HashMap::new(),
                nonce: 0,
                gas_estimate: Some(21_000),
                fee_data: Some(FeeData {
                    gas_price: Some(20_000_000_000),
                    max_fee_per_gas: Some(30_000_000_000),
                    max_priority_fee_per_gas: Some(1_500_000_000),
                }),
                balance_failure: false,
                send_failure: None,
                call_responses: HashMap::new(),
                selector_responses: HashMap::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
                calls: CallCounts::default(),
            }),
            events,
            authorization_gate: Notify::new(),
            hold_authorization: AtomicBool::new(false),
            account_read_gate: Notify::new(),
            hold_account_reads: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ProviderEvent) {
        debug!(?event, "in-memory wallet emitting event");
        // No subscribers is fine: nobody is listening yet.
        let _ = self.events.send(event);
    }

    // ── Setup ──

    pub fn add_account(&self) -> Address {
        self.add_signer(LocalSigner::new_random())
    }

    pub fn add_signer(&self, signer: LocalSigner) -> Address {
        let address = signer.address();
        self.state().signers.push(signer);
        address
    }

    /// Marks an account as already authorized for this origin, as after a previous visit.
    pub fn authorize(&self, address: Address) {
        let mut state = self.state();
        if !state.authorized.contains(&address) {
            state.authorized.push(address);
        }
    }

    pub fn set_locked(&self, locked: bool) {
        self.state().locked = locked;
    }

    /// Makes every prompt (authorization, switch, send, sign) fail as if the user clicked reject.
    pub fn set_reject_requests(&self, reject: bool) {
        self.state().reject_requests = reject;
    }

    pub fn set_balance(&self, chain_id: u64, address: Address, wei: U256) {
        self.state().balances.insert((chain_id, address), wei);
    }

    pub fn add_chain(&self, chain_id: u64) {
        self.state().known_chains.insert(chain_id);
    }

    pub fn forget_chain(&self, chain_id: u64) {
        self.state().known_chains.remove(&chain_id);
    }

    pub fn set_gas_estimate(&self, gas: Option<u64>) {
        self.state().gas_estimate = gas;
    }

    /// `None` makes fee queries fail.
    pub fn set_fee_data(&self, fee_data: Option<FeeData>) {
        self.state().fee_data = fee_data;
    }

    pub fn set_balance_failure(&self, fail: bool) {
        self.state().balance_failure = fail;
    }

    pub fn set_send_failure(&self, failure: Option<ProviderError>) {
        self.state().send_failure = failure;
    }

    pub fn set_call_response(&self, to: Address, response: Bytes) {
        self.state().call_responses.insert(to, response);
    }

    /// Answers calls to `to` whose calldata starts with `selector`. Takes
    /// precedence over [`Self::set_call_response`] for that contract.
    pub fn set_call_response_for(&self, to: Address, selector: [u8; 4], response: Bytes) {
        self.state().selector_responses.insert((to, selector), response);
    }

    /// Leaves the next authorization prompt unanswered until [`Self::release_authorization`].
    pub fn hold_authorization(&self) {
        self.hold_authorization.store(true, Ordering::SeqCst);
    }

    pub fn release_authorization(&self) {
        self.hold_authorization.store(false, Ordering::SeqCst);
        self.authorization_gate.notify_one();
    }

    /// Stalls the next `eth_accounts` read until [`Self::release_account_reads`].
    pub fn hold_account_reads(&self) {
        self.hold_account_reads.store(true, Ordering::SeqCst);
    }

    pub fn release_account_reads(&self) {
        self.hold_account_reads.store(false, Ordering::SeqCst);
        self.account_read_gate.notify_one();
    }

    // ── Actions taken inside the extension UI ──

    /// The user picks another account in the extension.
    pub fn select_account(&self, address: Address) {
        let accounts = {
            let mut state = self.state();
            state.authorized.retain(|existing| *existing != address);
            state.authorized.insert(0, address);
            state.authorized.clone()
        };
        self.emit(ProviderEvent::AccountsChanged(accounts));
    }

    /// The user disconnects this origin from inside the extension.
    pub fn revoke_authorization(&self) {
        self.state().authorized.clear();
        self.emit(ProviderEvent::AccountsChanged(Vec::new()));
    }

    /// The user switches networks from inside the extension.
    pub fn change_chain(&self, chain_id: u64) {
        {
            let mut state = self.state();
            state.known_chains.insert(chain_id);
            state.chain_id = chain_id;
        }
        self.emit(ProviderEvent::ChainChanged(format!("0x{chain_id:x}")));
    }

    /// Delivers a raw notification, e.g. a duplicate of one already sent.
    pub fn emit_event(&self, event: ProviderEvent) {
        self.emit(event);
    }

    // ── Inspection ──

    pub fn calls(&self) -> CallCounts {
        self.state().calls.clone()
    }

    pub fn sent_transactions(&self) -> Vec<TxRequest> {
        self.state().sent.clone()
    }

    pub fn current_chain(&self) -> u64 {
        self.state().chain_id
    }

    pub fn balance_of(&self, chain_id: u64, address: Address) -> U256 {
        self.state()
            .balances
            .get(&(chain_id, address))
            .copied()
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

fn user_rejected(message: &str) -> ProviderError {
    ProviderError::rpc(codes::USER_REJECTED, message)
}

fn unauthorized() -> ProviderError {
    ProviderError::rpc(
        codes::UNAUTHORIZED,
        "The requested account and/or method has not been authorized by the user.",
    )
}

#[async_trait]
impl WalletProvider for InMemoryWallet {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.state().calls.request_accounts += 1;

        if self.hold_authorization.load(Ordering::SeqCst) {
            self.authorization_gate.notified().await;
        }

        let mut state = self.state();
        if state.locked {
            return Err(ProviderError::rpc(codes::UNAUTHORIZED, "Wallet is locked"));
        }
        if state.reject_requests {
            return Err(user_rejected("User rejected the request."));
        }

        let addresses: Vec<Address> = state.signers.iter().map(|signer| signer.address()).collect();
        for address in addresses {
            if !state.authorized.contains(&address) {
                state.authorized.push(address);
            }
        }
        Ok(state.authorized.clone())
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.state().calls.accounts += 1;

        if self.hold_account_reads.load(Ordering::SeqCst) {
            self.account_read_gate.notified().await;
        }

        let state = self.state();
        if state.locked {
            return Ok(Vec::new());
        }
        Ok(state.authorized.clone())
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let mut state = self.state();
        state.calls.chain_id += 1;
        Ok(state.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        let changed = {
            let mut state = self.state();
            state.calls.switch_chain += 1;
            state.calls.switch_targets.push(chain_id);

            if !state.known_chains.contains(&chain_id) {
                return Err(ProviderError::rpc(
                    codes::UNRECOGNIZED_CHAIN,
                    format!(
                        "Unrecognized chain ID \"0x{chain_id:x}\". Try adding the chain using wallet_addEthereumChain first."
                    ),
                ));
            }
            if state.reject_requests {
                return Err(user_rejected("User rejected the request."));
            }

            let changed = state.chain_id != chain_id;
            state.chain_id = chain_id;
            changed
        };

        if changed {
            self.emit(ProviderEvent::ChainChanged(format!("0x{chain_id:x}")));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        let mut state = self.state();
        state.calls.get_balance += 1;
        if state.balance_failure {
            return Err(ProviderError::Transport("balance endpoint unreachable".to_owned()));
        }
        let chain_id = state.chain_id;
        Ok(state
            .balances
            .get(&(chain_id, address))
            .copied()
            .unwrap_or_default())
    }

    async fn fee_data(&self) -> Result<FeeData, ProviderError> {
        let mut state = self.state();
        state.calls.fee_data += 1;
        state
            .fee_data
            .ok_or_else(|| ProviderError::rpc(codes::INTERNAL_ERROR, "fee data unavailable"))
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64, ProviderError> {
        let mut state = self.state();
        state.calls.estimate_gas += 1;
        state
            .gas_estimate
            .ok_or_else(|| ProviderError::rpc(codes::EXECUTION_ERROR, "execution reverted"))
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256, ProviderError> {
        let mut state = self.state();
        state.calls.send_transaction += 1;

        if let Some(failure) = state.send_failure.clone() {
            return Err(failure);
        }
        if !state.authorized.contains(&tx.from) {
            return Err(unauthorized());
        }
        if state.reject_requests {
            return Err(user_rejected("User denied transaction signature."));
        }

        let chain_id = state.chain_id;
        let available = state
            .balances
            .get(&(chain_id, tx.from))
            .copied()
            .unwrap_or_default();
        if available < tx.value {
            return Err(ProviderError::rpc(
                codes::EXECUTION_ERROR,
                "insufficient funds for gas * price + value",
            ));
        }

        state.balances.insert((chain_id, tx.from), available - tx.value);
        if let Some(to) = tx.to {
            let credited = state
                .balances
                .get(&(chain_id, to))
                .copied()
                .unwrap_or_default()
                .saturating_add(tx.value);
            state.balances.insert((chain_id, to), credited);
        }

        state.nonce += 1;
        let nonce = state.nonce;

        let mut preimage = Vec::with_capacity(20 + 8 + 20 + 32);
        preimage.extend_from_slice(tx.from.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(tx.to.unwrap_or_default().as_slice());
        preimage.extend_from_slice(&tx.value.to_be_bytes::<32>());
        let tx_hash = keccak256(&preimage);

        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number: Some(nonce),
                success: true,
            },
        );
        state.sent.push(tx);
        Ok(tx_hash)
    }

    async fn sign_message(&self, address: Address, message: &[u8]) -> Result<Bytes, ProviderError> {
        let mut state = self.state();
        state.calls.sign_message += 1;

        if !state.authorized.contains(&address) {
            return Err(unauthorized());
        }
        if state.reject_requests {
            return Err(user_rejected("User denied message signature."));
        }

        let signer = state
            .signers
            .iter()
            .find(|signer| signer.address() == address)
            .ok_or_else(unauthorized)?;
        signer
            .sign_personal(message)
            .map(Bytes::from)
            .map_err(|err| ProviderError::rpc(codes::INTERNAL_ERROR, err.to_string()))
    }

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ProviderError> {
        let mut state = self.state();
        state.calls.call += 1;
        let to = tx.to.ok_or_else(|| ProviderError::rpc(codes::EXECUTION_ERROR, "execution reverted"))?;
        let by_selector = tx
            .data
            .get(..4)
            .and_then(|selector| <[u8; 4]>::try_from(selector).ok())
            .and_then(|selector| state.selector_responses.get(&(to, selector)));
        by_selector
            .or_else(|| state.call_responses.get(&to))
            .cloned()
            .ok_or_else(|| ProviderError::rpc(codes::EXECUTION_ERROR, "execution reverted"))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ProviderError> {
        let mut state = self.state();
        state.calls.transaction_receipt += 1;
        Ok(state.receipts.get(&tx_hash).cloned())
    }
}
