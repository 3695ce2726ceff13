//! Swap router deployments and the wrapped native token each router routes through.

use alloy_primitives::{Address, address};

use crate::{BASE, BASE_SEPOLIA, ETHEREUM, POLYGON, SEPOLIA};

const ROUTERS: &[(u64, Address)] = &[
    (ETHEREUM, address!("E592427A0AEce92De3Edee1F18E0157C05861564")),
    (SEPOLIA, address!("C532a74256D3Db42D0Bf7a0400fEFDbad7694008")),
    (POLYGON, address!("E592427A0AEce92De3Edee1F18E0157C05861564")),
    (BASE, address!("2626664c2603336E57B271c5C0b26F421741e481")),
    (BASE_SEPOLIA, address!("2626664c2603336E57B271c5C0b26F421741e481")),
];

const WRAPPED_NATIVE: &[(u64, Address)] = &[
    (ETHEREUM, address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")),
    (SEPOLIA, address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14")),
    (POLYGON, address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270")),
    (BASE, address!("4200000000000000000000000000000000000006")),
    (BASE_SEPOLIA, address!("4200000000000000000000000000000000000006")),
];

fn lookup(table: &[(u64, Address)], chain_id: u64) -> Option<Address> {
    table
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, address)| *address)
}

/// Swap router on `chain_id`, `None` where swaps are unsupported.
pub fn router_address(chain_id: u64) -> Option<Address> {
    lookup(ROUTERS, chain_id)
}

/// Wrapped native token used as the last hop when swapping into the native asset.
pub fn wrapped_native(chain_id: u64) -> Option<Address> {
    lookup(WRAPPED_NATIVE, chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routers_exist_for_every_builtin_chain() {
        for chain_id in [ETHEREUM, SEPOLIA, POLYGON, BASE, BASE_SEPOLIA] {
            assert!(router_address(chain_id).is_some(), "{chain_id}");
            assert!(wrapped_native(chain_id).is_some(), "{chain_id}");
        }
        assert_eq!(router_address(ETHEREUM), router_address(POLYGON));
        assert!(router_address(31_337).is_none());
    }

    #[test]
    fn wrapped_native_matches_the_token_list() {
        let weth = crate::tokens::tokens_for_chain(SEPOLIA)
            .into_iter()
            .find(|token| token.symbol == "WETH")
            .map(|token| token.address);
        assert_eq!(wrapped_native(SEPOLIA), weth);
    }
}
