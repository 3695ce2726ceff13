//! The contract between the session manager and an injected wallet provider.
//!
//! Methods mirror the EIP-1193 surface a browser-extension wallet exposes:
//! account authorization, chain selection, event subscription, balance and
//! fee queries, and signing/submission bound to the authorized account.

pub mod memory;

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub use memory::{CallCounts, InMemoryWallet};

/// EIP-1193 / JSON-RPC error codes the session manager classifies.
pub mod codes {
    pub const USER_REJECTED: i64 = 4001;
    pub const UNAUTHORIZED: i64 = 4100;
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    pub const DISCONNECTED: i64 = 4900;
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    pub const RESOURCE_UNAVAILABLE: i64 = -32002;
    pub const EXECUTION_ERROR: i64 = -32000;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{message}")]
    Rpc { code: i64, message: String },
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(codes::USER_REJECTED)
            || self.message().to_lowercase().contains("user rejected")
    }

    pub fn is_locked(&self) -> bool {
        self.code() == Some(codes::UNAUTHORIZED) || self.message().to_lowercase().contains("locked")
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(codes::UNRECOGNIZED_CHAIN)
    }
}

/// Notifications pushed by the wallet outside of any request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    /// EIP-1193 delivers the new chain id as a hex quantity.
    ChainChanged(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas: Option<u64>,
}

/// Current fee rates in wei.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeData {
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Prompts the user to authorize accounts (`eth_requestAccounts`).
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Accounts already authorized for this origin, without prompting (`eth_accounts`).
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Fails with [`codes::UNRECOGNIZED_CHAIN`] when the wallet does not know the network.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;

    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    async fn get_balance(&self, address: Address) -> Result<U256, ProviderError>;

    async fn fee_data(&self) -> Result<FeeData, ProviderError>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64, ProviderError>;

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256, ProviderError>;

    /// EIP-191 `personal_sign`; returns the 65-byte signature.
    async fn sign_message(&self, address: Address, message: &[u8]) -> Result<Bytes, ProviderError>;

    async fn call(&self, tx: &TxRequest) -> Result<Bytes, ProviderError>;

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_eip1193_codes() {
        let rejected = ProviderError::rpc(codes::USER_REJECTED, "User rejected the request.");
        assert!(rejected.is_user_rejection());
        assert!(!rejected.is_unrecognized_chain());

        let locked = ProviderError::rpc(codes::RESOURCE_UNAVAILABLE, "Wallet is locked");
        assert!(locked.is_locked());

        let unknown_chain = ProviderError::rpc(codes::UNRECOGNIZED_CHAIN, "Unrecognized chain ID");
        assert!(unknown_chain.is_unrecognized_chain());
        assert_eq!(unknown_chain.code(), Some(4902));
    }

    #[test]
    fn rpc_errors_display_the_provider_message_verbatim() {
        let err = ProviderError::rpc(codes::EXECUTION_ERROR, "insufficient funds for gas * price + value");
        assert_eq!(err.to_string(), "insufficient funds for gas * price + value");
        assert_eq!(ProviderError::Transport("timeout".into()).code(), None);
    }
}
