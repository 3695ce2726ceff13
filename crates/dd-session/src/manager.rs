use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::{Address, B256, Bytes, U256};
use dd_abi::units::parse_ether;
use dd_api_types::{Notice, SessionSnapshot, TransactionPreview};
use dd_chains::ChainRegistry;
use dd_provider::{FeeData, TxReceipt, WalletProvider};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::actor::{Command, Reply, SessionActor};
use crate::preview::{PendingTransaction, SignerPreviewContext, decode_transaction};
use crate::{Notifier, SessionConfig, SessionError, SignerHandle};

const COMMAND_CAPACITY: usize = 32;

pub struct SessionManager;

/// A native transfer accepted by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeTransfer {
    pub tx_hash: B256,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

impl SessionManager {
    /// Starts the session actor on the current tokio runtime.
    ///
    /// `provider` is `None` when no wallet is injected. The actor stops once
    /// every [`SessionHandle`] is dropped.
    pub fn spawn(
        provider: Option<Arc<dyn WalletProvider>>,
        registry: Arc<ChainRegistry>,
        config: SessionConfig,
    ) -> SessionHandle {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot {
            provider_installed: provider.is_some(),
            ..SessionSnapshot::default()
        });
        let (signer_tx, signer) = watch::channel(None);
        let notifier = Notifier::new();
        let connect_gate = Arc::new(AtomicBool::new(false));

        let actor = SessionActor::new(
            provider.clone(),
            registry.clone(),
            config,
            snapshot_tx,
            signer_tx,
            notifier.clone(),
            connect_gate.clone(),
        );
        tokio::spawn(actor.run(command_rx));

        SessionHandle {
            commands,
            snapshot,
            signer,
            notifier,
            connect_gate,
            provider,
            registry,
        }
    }
}

/// Cheap, cloneable access to the wallet session.
///
/// `connect`, `disconnect` and `switch_chain` are serialized through the
/// session actor. Signing, sending and reads go straight to the current
/// signer handle so a pending wallet confirmation never blocks event handling.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    signer: watch::Receiver<Option<SignerHandle>>,
    notifier: Notifier,
    connect_gate: Arc<AtomicBool>,
    provider: Option<Arc<dyn WalletProvider>>,
    registry: Arc<ChainRegistry>,
}

impl SessionHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    /// Requests fresh authorization from the wallet. Fails immediately with
    /// [`SessionError::ConnectInProgress`] while another connect is pending.
    ///
    /// The gate is only taken once the command slot is reserved, so a caller
    /// dropped while waiting on a full queue never leaves it latched.
    pub async fn connect(&self) -> Result<SessionSnapshot, SessionError> {
        let permit = self.commands.reserve().await.map_err(|_| SessionError::Closed)?;
        if self
            .connect_gate
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::ConnectInProgress);
        }

        let (reply, response) = oneshot::channel();
        permit.send(Command::Connect { reply });
        response.await.map_err(|_| SessionError::Closed)?
    }

    /// Clears the local session. The wallet keeps its own authorization.
    pub async fn disconnect(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    pub async fn switch_chain(&self, chain_id: u64) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::SwitchChain { chain_id, reply })
            .await
    }

    pub async fn refresh_balance(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::RefreshBalance { reply }).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    pub fn signer(&self) -> Result<SignerHandle, SessionError> {
        self.signer.borrow().clone().ok_or(SessionError::NotConnected)
    }

    /// Sends `amount` (decimal ether) of the native asset to `to`.
    pub async fn send_native_transfer(&self, to: Address, amount: &str) -> Result<NativeTransfer, SessionError> {
        let signer = self.signer()?;
        let value = parse_ether(amount).map_err(SessionError::transaction_failed)?;
        let tx_hash = signer.send_transaction(to, value, Bytes::new()).await?;
        Ok(NativeTransfer {
            tx_hash,
            from: signer.address(),
            to,
            value,
        })
    }

    /// Sends a transaction with optional calldata, e.g. a contract call.
    pub async fn send_transaction(&self, to: Address, value: U256, data: Bytes) -> Result<B256, SessionError> {
        self.signer()?.send_transaction(to, value, data).await
    }

    pub async fn sign_message(&self, message: &str) -> Result<Bytes, SessionError> {
        self.signer()?.sign_message(message).await
    }

    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, SessionError> {
        self.signer()?.call(to, data).await
    }

    pub async fn preview_transaction(&self, tx: &PendingTransaction) -> Result<TransactionPreview, SessionError> {
        let signer = self.signer()?;
        let ctx = SignerPreviewContext {
            signer: &signer,
            chain_id: self.snapshot.borrow().chain_id,
        };
        Ok(decode_transaction(&ctx, tx).await)
    }

    /// Current fee rates. Needs an installed wallet, not a connection.
    pub async fn fee_data(&self) -> Result<FeeData, SessionError> {
        let provider = self.provider.as_ref().ok_or(SessionError::NotInstalled)?;
        Ok(provider.fee_data().await?)
    }

    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, SessionError> {
        let provider = self.provider.as_ref().ok_or(SessionError::NotInstalled)?;
        Ok(provider.transaction_receipt(tx_hash).await?)
    }
}
