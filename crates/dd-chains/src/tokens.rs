use alloy_primitives::{Address, address};
use dd_api_types::TokenSummary;

use crate::{BASE, BASE_SEPOLIA, ETHEREUM, POLYGON, SEPOLIA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: u8,
}

const TOKEN_INFO: &[TokenInfo] = &[
    TokenInfo { symbol: "WETH", name: "Wrapped Ethereum", decimals: 18 },
    TokenInfo { symbol: "USDC", name: "USD Coin", decimals: 6 },
    TokenInfo { symbol: "USDT", name: "Tether USD", decimals: 6 },
    TokenInfo { symbol: "DAI", name: "Dai Stablecoin", decimals: 18 },
    TokenInfo { symbol: "WBTC", name: "Wrapped Bitcoin", decimals: 8 },
    TokenInfo { symbol: "UNI", name: "Uniswap", decimals: 18 },
    TokenInfo { symbol: "LINK", name: "Chainlink", decimals: 18 },
    TokenInfo { symbol: "MATIC", name: "Polygon", decimals: 18 },
];

const TOKEN_ADDRESSES: &[(u64, &str, Address)] = &[
    (ETHEREUM, "WETH", address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
    (ETHEREUM, "USDC", address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")),
    (ETHEREUM, "USDT", address!("dAC17F958D2ee523a2206206994597C13D831ec7")),
    (ETHEREUM, "DAI", address!("6B175474E89094C44Da98b954EedeAC495271d0F")),
    (ETHEREUM, "WBTC", address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599")),
    (ETHEREUM, "UNI", address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984")),
    (ETHEREUM, "LINK", address!("514910771AF9Ca656af840dff83E8264EcF986CA")),
    (SEPOLIA, "WETH", address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14")),
    (SEPOLIA, "USDC", address!("94a9D9AC8a22534E3FaCa9F4e7F2E2cf85d5E4C8")),
    (SEPOLIA, "DAI", address!("3e622317f8C93f7328350cF0B56d9eD4C620C5d6")),
    (POLYGON, "WETH", address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619")),
    (POLYGON, "USDC", address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174")),
    (POLYGON, "USDT", address!("c2132D05D31c914a87C6611C10748AEb04B58e8F")),
    (POLYGON, "DAI", address!("8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063")),
    (POLYGON, "WBTC", address!("1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6")),
    (POLYGON, "MATIC", address!("0000000000000000000000000000000000001010")),
    (BASE, "WETH", address!("4200000000000000000000000000000000000006")),
    (BASE, "USDC", address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")),
    (BASE, "DAI", address!("50c5725949A6F0c72E6C4a641F24049A917E0Cb7")),
    (BASE_SEPOLIA, "WETH", address!("4200000000000000000000000000000000000006")),
    (BASE_SEPOLIA, "USDC", address!("036CbD53842c5426634e7929541eC2318f3dCF7e")),
];

pub fn token_info(symbol: &str) -> Option<TokenInfo> {
    TOKEN_INFO.iter().copied().find(|info| info.symbol == symbol)
}

/// Well-known tokens deployed on a chain, in registry order. Empty for unknown chains.
pub fn tokens_for_chain(chain_id: u64) -> Vec<TokenSummary> {
    TOKEN_ADDRESSES
        .iter()
        .filter(|(id, _, _)| *id == chain_id)
        .filter_map(|(_, symbol, address)| {
            let info = token_info(symbol)?;
            Some(TokenSummary {
                symbol: info.symbol.to_owned(),
                name: info.name.to_owned(),
                address: *address,
                decimals: info.decimals,
            })
        })
        .collect()
}
