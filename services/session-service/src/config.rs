use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_EVENT_POLL: Duration = Duration::from_millis(1000);
const DEFAULT_RECEIPT_POLL: Duration = Duration::from_millis(2000);

/// Which wallet provider the service injects into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WalletMode {
    /// No provider at all; every session operation reports `not_installed`.
    None,
    /// A funded in-process wallet, for local development.
    Demo,
    Rpc(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ServiceConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) wallet: WalletMode,
    /// RocksDB directory for transaction history; in-memory when unset.
    pub(crate) history_path: Option<String>,
    pub(crate) event_poll_interval: Duration,
    pub(crate) receipt_poll_interval: Duration,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("DAPPDOCK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = raw_addr
            .trim()
            .parse()
            .with_context(|| format!("invalid DAPPDOCK_BIND_ADDR: {raw_addr}"))?;

        let wallet = match (
            lookup("DAPPDOCK_WALLET").map(|mode| mode.trim().to_lowercase()),
            lookup("DAPPDOCK_WALLET_RPC_URL").filter(|url| !url.trim().is_empty()),
        ) {
            (Some(mode), _) if mode == "none" => WalletMode::None,
            (Some(mode), None) if mode == "rpc" => WalletMode::Rpc("http://localhost:8545".to_owned()),
            (_, Some(url)) => WalletMode::Rpc(url.trim().to_owned()),
            (Some(mode), None) if mode != "demo" => {
                anyhow::bail!("unknown DAPPDOCK_WALLET mode: {mode}")
            }
            _ => WalletMode::Demo,
        };

        let history_path = lookup("DAPPDOCK_HISTORY_PATH").filter(|path| !path.trim().is_empty());

        Ok(Self {
            bind_addr,
            wallet,
            history_path,
            event_poll_interval: millis(&lookup, "DAPPDOCK_EVENT_POLL_MS", DEFAULT_EVENT_POLL)?,
            receipt_poll_interval: millis(&lookup, "DAPPDOCK_RECEIPT_POLL_MS", DEFAULT_RECEIPT_POLL)?,
        })
    }
}

fn millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid {key}: {raw}"))?;
    anyhow::ensure!(value > 0, "{key} must be positive");
    Ok(Duration::from_millis(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_demo_wallet_and_in_memory_history() -> Result<()> {
        let config = config(&[])?;
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse()?);
        assert_eq!(config.wallet, WalletMode::Demo);
        assert!(config.history_path.is_none());
        assert_eq!(config.event_poll_interval, Duration::from_secs(1));
        assert_eq!(config.receipt_poll_interval, Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn rpc_url_selects_json_rpc_wallet_unless_disabled() -> Result<()> {
        let rpc = config(&[("DAPPDOCK_WALLET_RPC_URL", "http://wallet:8545")])?;
        assert_eq!(rpc.wallet, WalletMode::Rpc("http://wallet:8545".to_owned()));

        let disabled = config(&[
            ("DAPPDOCK_WALLET", "none"),
            ("DAPPDOCK_WALLET_RPC_URL", "http://wallet:8545"),
        ])?;
        assert_eq!(disabled.wallet, WalletMode::None);
        Ok(())
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(config(&[("DAPPDOCK_BIND_ADDR", "localhost")]).is_err());
        assert!(config(&[("DAPPDOCK_RECEIPT_POLL_MS", "0")]).is_err());
        assert!(config(&[("DAPPDOCK_EVENT_POLL_MS", "fast")]).is_err());
        assert!(config(&[("DAPPDOCK_WALLET", "ledger")]).is_err());
    }
}
