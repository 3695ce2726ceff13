use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256};
use dd_provider::{FeeData, TxRequest, WalletProvider};

use crate::SessionError;

/// The wallet connection as seen by one connected session.
///
/// Each connect or account switch mints a new handle with a higher
/// generation; handles from a torn-down session are never handed out again.
#[derive(Clone)]
pub struct ProviderHandle {
    inner: Arc<dyn WalletProvider>,
    generation: u64,
}

impl ProviderHandle {
    pub(crate) fn new(inner: Arc<dyn WalletProvider>, generation: u64) -> Self {
        Self { inner, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn provider(&self) -> &Arc<dyn WalletProvider> {
        &self.inner
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.inner.name())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Signing and submission bound to the connected account.
#[derive(Clone, Debug)]
pub struct SignerHandle {
    provider: ProviderHandle,
    address: Address,
}

impl SignerHandle {
    pub(crate) fn new(provider: ProviderHandle, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn generation(&self) -> u64 {
        self.provider.generation()
    }

    fn request(&self, to: Option<Address>, value: U256, data: Bytes) -> TxRequest {
        TxRequest {
            from: self.address,
            to,
            value,
            data,
            gas: None,
        }
    }

    pub async fn send_transaction(&self, to: Address, value: U256, data: Bytes) -> Result<B256, SessionError> {
        self.provider
            .inner
            .send_transaction(self.request(Some(to), value, data))
            .await
            .map_err(SessionError::transaction_failed)
    }

    pub async fn sign_message(&self, message: &str) -> Result<Bytes, SessionError> {
        self.provider
            .inner
            .sign_message(self.address, message.as_bytes())
            .await
            .map_err(SessionError::signing_failed)
    }

    /// Read-only contract call from the connected account.
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, SessionError> {
        Ok(self
            .provider
            .inner
            .call(&self.request(Some(to), U256::ZERO, data))
            .await?)
    }

    pub async fn estimate_gas(&self, to: Option<Address>, value: U256, data: Bytes) -> Result<u64, SessionError> {
        Ok(self
            .provider
            .inner
            .estimate_gas(&self.request(to, value, data))
            .await?)
    }

    pub async fn fee_data(&self) -> Result<FeeData, SessionError> {
        Ok(self.provider.inner.fee_data().await?)
    }
}
