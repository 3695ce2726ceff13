//! Static registry of supported networks and their well-known tokens.
//!
//! Loaded once at startup. `DAPPDOCK_DEFAULT_CHAIN_ID` selects the chain a
//! fresh connection switches to, and `DAPPDOCK_RPC_URL_<chain id>` overrides
//! the public RPC endpoint of a chain.

pub mod dex;
pub mod tokens;

use anyhow::{Context, Result, anyhow};
use dd_api_types::{ChainSummary, NativeCurrencyInfo};
use tracing::info;

pub const ETHEREUM: u64 = 1;
pub const SEPOLIA: u64 = 11_155_111;
pub const POLYGON: u64 = 137;
pub const BASE: u64 = 8453;
pub const BASE_SEPOLIA: u64 = 84_532;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_owned(),
            symbol: symbol.to_owned(),
            decimals: 18,
        }
    }

    fn ether() -> Self {
        Self::new("Ethereum", "ETH")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInfo {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub rpc_url: String,
    pub native_currency: NativeCurrency,
}

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainInfo>,
    default_chain: u64,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ChainRegistry {
    pub fn builtin() -> Self {
        let chain = |id: u64, key: &str, name: &str, rpc_url: &str, currency: NativeCurrency| ChainInfo {
            id,
            key: key.to_owned(),
            name: name.to_owned(),
            rpc_url: rpc_url.to_owned(),
            native_currency: currency,
        };

        Self {
            chains: vec![
                chain(ETHEREUM, "ethereum", "Ethereum Mainnet", "https://eth.llamarpc.com", NativeCurrency::ether()),
                chain(SEPOLIA, "sepolia", "Sepolia Testnet", "https://rpc.sepolia.org", NativeCurrency::ether()),
                chain(POLYGON, "polygon", "Polygon Mainnet", "https://polygon-rpc.com", NativeCurrency::new("MATIC", "MATIC")),
                chain(BASE, "base", "Base Mainnet", "https://mainnet.base.org", NativeCurrency::ether()),
                chain(BASE_SEPOLIA, "baseSepolia", "Base Sepolia", "https://sepolia.base.org", NativeCurrency::ether()),
            ],
            default_chain: SEPOLIA,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup on top of the built-in chains.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = Self::builtin();

        for chain in &mut registry.chains {
            if let Some(url) = lookup(&format!("DAPPDOCK_RPC_URL_{}", chain.id)) {
                let url = url.trim().trim_end_matches('/').to_owned();
                if !url.is_empty() {
                    info!(chain_id = chain.id, %url, "overriding chain rpc url");
                    chain.rpc_url = url;
                }
            }
        }

        if let Some(raw) = lookup("DAPPDOCK_DEFAULT_CHAIN_ID") {
            let chain_id = parse_chain_id(&raw)
                .with_context(|| format!("invalid DAPPDOCK_DEFAULT_CHAIN_ID: {raw}"))?;
            registry.set_default_chain(chain_id)?;
        }

        Ok(registry)
    }

    pub fn set_default_chain(&mut self, chain_id: u64) -> Result<()> {
        if self.get(chain_id).is_none() {
            return Err(anyhow!("default chain {chain_id} is not a supported chain"));
        }
        self.default_chain = chain_id;
        Ok(())
    }

    pub fn default_chain_id(&self) -> u64 {
        self.default_chain
    }

    pub fn default_chain(&self) -> &ChainInfo {
        self.get(self.default_chain)
            .unwrap_or(&self.chains[0])
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainInfo> {
        self.chains.iter().find(|chain| chain.id == chain_id)
    }

    pub fn chains(&self) -> &[ChainInfo] {
        &self.chains
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.get(chain_id).is_some()
    }

    pub fn display_name(&self, chain_id: u64) -> String {
        self.get(chain_id)
            .map(|chain| chain.name.clone())
            .unwrap_or_else(|| format!("Chain {chain_id}"))
    }

    /// Native currency of a chain; unknown chains are assumed to be ether-denominated.
    pub fn native_currency(&self, chain_id: u64) -> NativeCurrency {
        self.get(chain_id)
            .map(|chain| chain.native_currency.clone())
            .unwrap_or_else(NativeCurrency::ether)
    }

    pub fn summaries(&self) -> Vec<ChainSummary> {
        self.chains
            .iter()
            .map(|chain| ChainSummary {
                id: chain.id,
                key: chain.key.clone(),
                name: chain.name.clone(),
                rpc_url: chain.rpc_url.clone(),
                native_currency: NativeCurrencyInfo {
                    name: chain.native_currency.name.clone(),
                    symbol: chain.native_currency.symbol.clone(),
                    decimals: chain.native_currency.decimals,
                },
                is_default: chain.id == self.default_chain,
            })
            .collect()
    }
}

/// Parses a chain id given either as a decimal string or as an EIP-155 hex quantity (`0x89`).
pub fn parse_chain_id(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex chain id: {raw}"));
    }
    trimmed
        .parse::<u64>()
        .with_context(|| format!("invalid chain id: {raw}"))
}

pub fn chain_id_hex(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}
