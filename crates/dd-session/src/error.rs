use dd_provider::ProviderError;
use thiserror::Error;

/// Terminal outcome of a session operation. Nothing is retried automatically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No wallet provider is installed. Please install a browser wallet to continue.")]
    NotInstalled,
    /// The wallet is locked or the user rejected the authorization prompt.
    #[error("{0}")]
    Locked(String),
    #[error("No accounts found")]
    NoAccounts,
    #[error("Chain {0} is not registered in the wallet. Please add this network to your wallet first.")]
    ChainNotRegistered(u64),
    #[error("Wallet not connected")]
    NotConnected,
    #[error("A connection request is already in progress")]
    ConnectInProgress,
    #[error("{0}")]
    TransactionFailed(String),
    #[error("{0}")]
    SigningFailed(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("session manager has shut down")]
    Closed,
}

impl SessionError {
    pub(crate) fn from_authorization(err: ProviderError) -> Self {
        if err.is_locked() || err.is_user_rejection() {
            Self::Locked(err.message())
        } else {
            Self::Provider(err)
        }
    }

    pub(crate) fn transaction_failed(err: impl ToString) -> Self {
        let message = err.to_string();
        if message.is_empty() {
            Self::TransactionFailed("Transaction failed".to_owned())
        } else {
            Self::TransactionFailed(message)
        }
    }

    pub(crate) fn signing_failed(err: impl ToString) -> Self {
        let message = err.to_string();
        if message.is_empty() {
            Self::SigningFailed("Failed to sign message".to_owned())
        } else {
            Self::SigningFailed(message)
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotInstalled => "not_installed",
            Self::Locked(_) => "locked",
            Self::NoAccounts => "no_accounts",
            Self::ChainNotRegistered(_) => "chain_not_registered",
            Self::NotConnected => "not_connected",
            Self::ConnectInProgress => "connect_in_progress",
            Self::TransactionFailed(_) => "transaction_failed",
            Self::SigningFailed(_) => "signing_failed",
            Self::Provider(_) => "provider",
            Self::Closed => "closed",
        }
    }
}
