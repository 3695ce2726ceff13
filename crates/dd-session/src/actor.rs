//! The single writer of the session record.
//!
//! Commands from [`crate::SessionHandle`], provider notifications and the
//! balance-refresh timer are multiplexed onto one task and handled strictly
//! one at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::{Address, U256};
use dd_api_types::SessionSnapshot;
use dd_chains::{ChainRegistry, parse_chain_id};
use dd_provider::{ProviderEvent, WalletProvider};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::preview::format_address;
use crate::state::Session;
use crate::{Notifier, ProviderHandle, SessionConfig, SessionError, SignerHandle};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

pub(crate) enum Command {
    Connect { reply: Reply<SessionSnapshot> },
    Disconnect { reply: Reply<SessionSnapshot> },
    SwitchChain { chain_id: u64, reply: Reply<SessionSnapshot> },
    RefreshBalance { reply: Reply<SessionSnapshot> },
}

pub(crate) struct SessionActor {
    provider: Option<Arc<dyn WalletProvider>>,
    registry: Arc<ChainRegistry>,
    config: SessionConfig,
    session: Session,
    generation: u64,
    events: Option<broadcast::Receiver<ProviderEvent>>,
    refresh: Option<Interval>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    signer_tx: watch::Sender<Option<SignerHandle>>,
    notifier: Notifier,
    connect_gate: Arc<AtomicBool>,
}

impl SessionActor {
    pub(crate) fn new(
        provider: Option<Arc<dyn WalletProvider>>,
        registry: Arc<ChainRegistry>,
        config: SessionConfig,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        signer_tx: watch::Sender<Option<SignerHandle>>,
        notifier: Notifier,
        connect_gate: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
            session: Session::default(),
            generation: 0,
            events: None,
            refresh: None,
            snapshot_tx,
            signer_tx,
            notifier,
            connect_gate,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.restore().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_event(&mut self.events) => self.handle_event(event).await,
                () = next_tick(&mut self.refresh) => {
                    if let Err(err) = self.refresh_balance().await {
                        warn!(error = %err, "background balance refresh failed");
                    }
                }
            }
        }

        debug!("session handles dropped, stopping session actor");
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot(&self.registry, self.provider.is_some())
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
        self.signer_tx.send_replace(self.session.signer.clone());
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect { reply } => {
                let _ = reply.send(Ok(self.disconnect()));
            }
            Command::SwitchChain { chain_id, reply } => {
                let result = self.switch_chain(chain_id).await;
                self.publish();
                let _ = reply.send(result.map(|()| self.snapshot()));
            }
            Command::RefreshBalance { reply } => {
                let result = self.refresh_balance().await;
                let _ = reply.send(result.map(|()| self.snapshot()));
            }
        }
    }

    // ── Lifecycle ──

    /// Adopts an account the wallet already authorized for us, without prompting.
    async fn restore(&mut self) {
        let Some(provider) = self.provider.clone() else {
            info!("no wallet provider installed");
            self.publish();
            return;
        };

        self.subscribe(&provider);
        if self.session.manually_disconnected {
            self.publish();
            return;
        }

        match provider.accounts().await {
            Ok(accounts) => match accounts.first() {
                Some(&account) => match self.establish(&provider, account).await {
                    Ok(()) => info!(%account, "restored wallet session"),
                    Err(err) => warn!(error = %err, "could not restore wallet session"),
                },
                None => debug!("wallet has no authorized accounts"),
            },
            Err(err) => warn!(error = %err, "failed to query authorized accounts"),
        }

        self.publish();
    }

    async fn connect(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.session.is_connecting = true;
        self.session.last_error = None;
        self.session.manually_disconnected = false;
        self.publish();

        let result = self.try_connect().await;

        self.session.is_connecting = false;
        if let Err(err) = &result {
            warn!(error = %err, "wallet connection failed");
            self.session.last_error = Some(err.to_string());
        }
        self.connect_gate.store(false, Ordering::Release);
        self.publish();

        result.map(|()| self.snapshot())
    }

    async fn try_connect(&mut self) -> Result<(), SessionError> {
        let provider = self.provider.clone().ok_or(SessionError::NotInstalled)?;

        if self.session.is_connected() {
            info!("tearing down existing session before re-authorizing");
            self.teardown();
            self.publish();
            if !self.config.teardown_settle.is_zero() {
                tokio::time::sleep(self.config.teardown_settle).await;
            }
        }

        let accounts = provider
            .request_accounts()
            .await
            .map_err(SessionError::from_authorization)?;
        let account = *accounts.first().ok_or(SessionError::NoAccounts)?;

        self.establish(&provider, account).await?;
        self.subscribe(&provider);
        info!(%account, chain_id = ?self.session.chain_id, provider = provider.name(), "wallet connected");

        let default_chain = self.config.default_chain_id;
        if self.session.chain_id != Some(default_chain) {
            if let Err(err) = self.request_chain_switch(&provider, default_chain).await {
                warn!(error = %err, default_chain, "could not switch to the default chain");
                self.session.last_error = Some(err.to_string());
            }
        }

        Ok(())
    }

    /// Binds the session to `account` with fresh handles. Nothing is
    /// committed if the chain id cannot be read.
    async fn establish(&mut self, provider: &Arc<dyn WalletProvider>, account: Address) -> Result<(), SessionError> {
        let chain_id = provider.chain_id().await?;
        let balance = match provider.get_balance(account).await {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!(error = %err, %account, "initial balance read failed");
                None
            }
        };

        self.generation += 1;
        let handle = ProviderHandle::new(provider.clone(), self.generation);
        self.session.signer = Some(SignerHandle::new(handle.clone(), account));
        self.session.provider = Some(handle);
        self.session.account = Some(account);
        self.session.chain_id = Some(chain_id);
        self.session.balance = balance;
        self.start_refresh();
        Ok(())
    }

    fn disconnect(&mut self) -> SessionSnapshot {
        self.teardown();
        self.session.manually_disconnected = true;
        self.session.last_error = None;
        self.publish();
        info!("wallet disconnected");
        self.snapshot()
    }

    /// Drops the connection, its event subscription and its refresh timer.
    fn teardown(&mut self) {
        self.session.clear_connection();
        self.events = None;
        self.refresh = None;
    }

    fn subscribe(&mut self, provider: &Arc<dyn WalletProvider>) {
        self.events = Some(provider.subscribe());
    }

    fn start_refresh(&mut self) {
        let period = self.config.balance_refresh_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.refresh = Some(interval);
    }

    fn connected_provider(&self) -> Result<(Arc<dyn WalletProvider>, Address), SessionError> {
        match (&self.session.provider, self.session.account) {
            (Some(handle), Some(account)) => Ok((handle.provider().clone(), account)),
            _ => Err(SessionError::NotConnected),
        }
    }

    // ── Chain ──

    async fn switch_chain(&mut self, chain_id: u64) -> Result<(), SessionError> {
        let (provider, _) = self.connected_provider()?;
        self.request_chain_switch(&provider, chain_id).await
    }

    async fn request_chain_switch(
        &mut self,
        provider: &Arc<dyn WalletProvider>,
        chain_id: u64,
    ) -> Result<(), SessionError> {
        provider.switch_chain(chain_id).await.map_err(|err| {
            if err.is_unrecognized_chain() {
                SessionError::ChainNotRegistered(chain_id)
            } else {
                SessionError::Provider(err)
            }
        })?;

        match provider.chain_id().await {
            Ok(current) => {
                self.session.chain_id = Some(current);
                self.session.balance = self.read_balance(provider, current).await;
            }
            Err(err) => warn!(error = %err, "failed to read chain id after switching"),
        }
        Ok(())
    }

    /// Native balance of the connected account, `None` when the read fails.
    async fn read_balance(&self, provider: &Arc<dyn WalletProvider>, chain_id: u64) -> Option<U256> {
        let account = self.session.account?;
        match provider.get_balance(account).await {
            Ok(balance) => Some(balance),
            Err(err) => {
                warn!(error = %err, chain_id, "balance read after chain change failed");
                None
            }
        }
    }

    async fn refresh_balance(&mut self) -> Result<(), SessionError> {
        let (provider, account) = self.connected_provider()?;
        let balance = provider.get_balance(account).await?;
        self.session.balance = Some(balance);
        self.publish();
        Ok(())
    }

    // ── Provider notifications ──

    async fn handle_event(&mut self, event: Result<ProviderEvent, RecvError>) {
        match event {
            Ok(ProviderEvent::AccountsChanged(accounts)) => self.on_accounts_changed(accounts).await,
            Ok(ProviderEvent::ChainChanged(chain_id_hex)) => self.on_chain_changed(&chain_id_hex).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed provider events, resynchronizing");
                self.resync().await;
            }
            Err(RecvError::Closed) => {
                warn!("provider event stream closed");
                self.events = None;
            }
        }
    }

    async fn on_accounts_changed(&mut self, accounts: Vec<Address>) {
        let Some(&next) = accounts.first() else {
            let was_connected = self.session.is_connected();
            self.teardown();
            self.session.manually_disconnected = true;
            self.publish();
            if was_connected {
                info!("wallet disconnected from the extension");
                self.notifier.info("Account disconnected");
            }
            return;
        };

        if self.session.account == Some(next) {
            debug!(account = %next, "account unchanged, ignoring notification");
            return;
        }

        let Some(provider) = self.provider.clone() else {
            return;
        };
        match self.establish(&provider, next).await {
            Ok(()) => {
                info!(account = %next, "switched account");
                self.publish();
                self.notifier
                    .success(format!("Switched to account: {}", format_address(Some(&next))));
            }
            Err(err) => {
                warn!(error = %err, account = %next, "error handling account change");
                self.notifier.error("Failed to update account");
            }
        }
    }

    async fn on_chain_changed(&mut self, chain_id_hex: &str) {
        let chain_id = match parse_chain_id(chain_id_hex) {
            Ok(chain_id) => chain_id,
            Err(err) => {
                warn!(error = %err, "ignoring malformed chain change");
                return;
            }
        };

        let Ok((provider, _)) = self.connected_provider() else {
            debug!(chain_id, "ignoring chain change while disconnected");
            return;
        };

        self.session.chain_id = Some(chain_id);
        self.session.balance = self.read_balance(&provider, chain_id).await;
        self.publish();

        info!(chain_id, "wallet switched chain");
        self.notifier
            .info(format!("Switched to {}", self.registry.display_name(chain_id)));
    }

    async fn resync(&mut self) {
        let Some(provider) = self.provider.clone() else {
            return;
        };

        match provider.accounts().await {
            Ok(accounts) => self.on_accounts_changed(accounts).await,
            Err(err) => warn!(error = %err, "failed to resynchronize accounts"),
        }

        if self.session.is_connected() {
            match provider.chain_id().await {
                Ok(chain_id) if self.session.chain_id != Some(chain_id) => {
                    self.on_chain_changed(&dd_chains::chain_id_hex(chain_id)).await;
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "failed to resynchronize chain id"),
            }
        }
    }
}

async fn next_event(events: &mut Option<broadcast::Receiver<ProviderEvent>>) -> Result<ProviderEvent, RecvError> {
    match events {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
