//! Wallet session manager.
//!
//! Owns the single connection to an injected wallet provider for the lifetime
//! of the process, reconciles account and chain notifications pushed by the
//! wallet, keeps the native balance fresh, and previews transactions before
//! they are handed to the wallet for confirmation.

mod actor;
pub mod config;
pub mod error;
pub mod handles;
pub mod manager;
pub mod notice;
pub mod preview;
mod state;


pub use config::SessionConfig;
pub use error::SessionError;
pub use handles::{ProviderHandle, SignerHandle};
pub use manager::{NativeTransfer, SessionHandle, SessionManager};
pub use notice::Notifier;
pub use preview::{
    PendingTransaction, PreviewContext, calculate_transaction_cost, classify_gas_price,
    classify_gas_price_wei, decode_transaction, format_address,
};
