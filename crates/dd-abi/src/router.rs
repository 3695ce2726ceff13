//! Swap router call encoding.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use dd_api_types::DecodedCall;

use crate::{AbiError, param};

sol! {
    interface ISwapRouter {
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[] amounts);
        function swapExactETHForTokens(uint256 amountOutMin, address[] path, address to, uint256 deadline) external payable returns (uint256[] amounts);
        function swapExactTokensForETH(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[] amounts);
        function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts);
    }
}

/// Slippage is expressed in basis points; 10 000 means the whole amount.
pub const MAX_SLIPPAGE_BPS: u32 = 10_000;

/// An exact-input swap along `path`, paying out to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactInputSwap {
    pub amount_in: U256,
    pub amount_out_min: U256,
    pub path: Vec<Address>,
    pub recipient: Address,
    /// Unix seconds after which the router rejects the swap.
    pub deadline: u64,
}

pub fn encode_swap_exact_tokens_for_tokens(swap: &ExactInputSwap) -> Bytes {
    ISwapRouter::swapExactTokensForTokensCall {
        amountIn: swap.amount_in,
        amountOutMin: swap.amount_out_min,
        path: swap.path.clone(),
        to: swap.recipient,
        deadline: U256::from(swap.deadline),
    }
    .abi_encode()
    .into()
}

pub fn encode_swap_exact_tokens_for_eth(swap: &ExactInputSwap) -> Bytes {
    ISwapRouter::swapExactTokensForETHCall {
        amountIn: swap.amount_in,
        amountOutMin: swap.amount_out_min,
        path: swap.path.clone(),
        to: swap.recipient,
        deadline: U256::from(swap.deadline),
    }
    .abi_encode()
    .into()
}

pub fn encode_get_amounts_out(amount_in: U256, path: &[Address]) -> Bytes {
    ISwapRouter::getAmountsOutCall {
        amountIn: amount_in,
        path: path.to_vec(),
    }
    .abi_encode()
    .into()
}

/// Amounts along the path returned by `getAmountsOut`; the last one is the output.
pub fn decode_amounts_out(data: &[u8]) -> Result<Vec<U256>, AbiError> {
    ISwapRouter::getAmountsOutCall::abi_decode_returns(data)
        .map_err(|_| AbiError::InvalidReturnData(data.len()))
}

/// Minimum output after allowing `slippage_bps` of price movement, rounded down.
pub fn apply_slippage(amount: U256, slippage_bps: u32) -> U256 {
    let keep = MAX_SLIPPAGE_BPS - slippage_bps.min(MAX_SLIPPAGE_BPS);
    amount * U256::from(keep) / U256::from(MAX_SLIPPAGE_BPS)
}

fn join_path(path: &[Address]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn decode_swap_call(data: &[u8]) -> Option<DecodedCall> {
    let selector = data.get(..4)?;

    let (name, call) = if selector == ISwapRouter::swapExactTokensForTokensCall::SELECTOR {
        let call = ISwapRouter::swapExactTokensForTokensCall::abi_decode(data).ok()?;
        ("swapExactTokensForTokens", (call.amountIn, call.amountOutMin, call.path, call.to, call.deadline))
    } else if selector == ISwapRouter::swapExactTokensForETHCall::SELECTOR {
        let call = ISwapRouter::swapExactTokensForETHCall::abi_decode(data).ok()?;
        ("swapExactTokensForETH", (call.amountIn, call.amountOutMin, call.path, call.to, call.deadline))
    } else {
        return None;
    };

    let (amount_in, amount_out_min, path, to, deadline) = call;
    Some(DecodedCall {
        name: name.to_owned(),
        params: vec![
            param("amountIn", "uint256", amount_in),
            param("amountOutMin", "uint256", amount_out_min),
            param("path", "address[]", join_path(&path)),
            param("to", "address", to),
            param("deadline", "uint256", deadline),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode_known_call;

    fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_be_bytes::<32>()
    }

    fn swap() -> ExactInputSwap {
        ExactInputSwap {
            amount_in: U256::from(1_000_000u64),
            amount_out_min: U256::from(995u64),
            path: vec![Address::repeat_byte(0x01), Address::repeat_byte(0x02)],
            recipient: Address::repeat_byte(0x03),
            deadline: 1_700_000_000,
        }
    }

    #[test]
    fn router_selectors_match_the_deployed_interface() {
        assert_eq!(&encode_swap_exact_tokens_for_tokens(&swap())[..4], &[0x38, 0xed, 0x17, 0x39]);
        assert_eq!(&encode_swap_exact_tokens_for_eth(&swap())[..4], &[0x18, 0xcb, 0xaf, 0xe5]);
        assert_eq!(&encode_get_amounts_out(U256::from(1), &swap().path)[..4], &[0xd0, 0x6c, 0xa6, 0x1f]);
    }

    #[test]
    fn swaps_decode_for_preview() {
        let decoded = decode_known_call(&encode_swap_exact_tokens_for_tokens(&swap())).unwrap();
        assert_eq!(decoded.name, "swapExactTokensForTokens");
        assert_eq!(decoded.params[1].value, "995");
        assert_eq!(
            decoded.params[2].value,
            format!("{},{}", Address::repeat_byte(0x01), Address::repeat_byte(0x02))
        );
        assert_eq!(decoded.params[4].value, "1700000000");
    }

    #[test]
    fn slippage_rounds_down_and_saturates() {
        assert_eq!(apply_slippage(U256::from(1000), 50), U256::from(995));
        assert_eq!(apply_slippage(U256::from(999), 50), U256::from(994));
        assert_eq!(apply_slippage(U256::from(1000), 0), U256::from(1000));
        assert_eq!(apply_slippage(U256::from(1000), 20_000), U256::ZERO);
    }

    #[test]
    fn decodes_amounts_out() {
        let data = [word(0x20), word(2), word(1_000), word(2_500)].concat();
        assert_eq!(
            decode_amounts_out(&data).unwrap(),
            vec![U256::from(1_000), U256::from(2_500)]
        );
        assert_eq!(decode_amounts_out(&data[..40]), Err(AbiError::InvalidReturnData(40)));
    }
}
