use std::time::Duration;

use anyhow::{Context, Result};
use dd_chains::ChainRegistry;

pub const DEFAULT_BALANCE_REFRESH: Duration = Duration::from_secs(10);
pub const DEFAULT_TEARDOWN_SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Chain a fresh connection switches the wallet to.
    pub default_chain_id: u64,
    pub balance_refresh_interval: Duration,
    /// Pause between tearing down an existing session and re-authorizing.
    pub teardown_settle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(dd_chains::SEPOLIA)
    }
}

impl SessionConfig {
    pub fn new(default_chain_id: u64) -> Self {
        Self {
            default_chain_id,
            balance_refresh_interval: DEFAULT_BALANCE_REFRESH,
            teardown_settle: DEFAULT_TEARDOWN_SETTLE,
        }
    }

    pub fn from_env(registry: &ChainRegistry) -> Result<Self> {
        Self::from_lookup(registry, |key| std::env::var(key).ok())
    }

    /// Reads `DAPPDOCK_BALANCE_REFRESH_SECS` and `DAPPDOCK_TEARDOWN_SETTLE_MS`;
    /// the default chain comes from the registry.
    pub fn from_lookup<F>(registry: &ChainRegistry, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(registry.default_chain_id());

        if let Some(raw) = lookup("DAPPDOCK_BALANCE_REFRESH_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid DAPPDOCK_BALANCE_REFRESH_SECS: {raw}"))?;
            anyhow::ensure!(secs > 0, "DAPPDOCK_BALANCE_REFRESH_SECS must be positive");
            config.balance_refresh_interval = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("DAPPDOCK_TEARDOWN_SETTLE_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid DAPPDOCK_TEARDOWN_SETTLE_MS: {raw}"))?;
            config.teardown_settle = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
