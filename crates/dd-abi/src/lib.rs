//! ERC-20 call encoding and best-effort decoding of well-known call data.

pub mod router;
pub mod units;

use alloy_primitives::{Address, Bytes, U256, hex};
use alloy_sol_types::{SolCall, sol};
use dd_api_types::{DecodedCall, DecodedParam};
use thiserror::Error;

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
        function totalSupply() external view returns (uint256);
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },
    #[error("invalid hex data: {0}")]
    InvalidHex(String),
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("unexpected return data length {0}")]
    InvalidReturnData(usize),
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("{function} takes {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },
}

pub fn parse_address(input: &str) -> Result<Address, AbiError> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|_| AbiError::InvalidAddress(input.to_owned()))
}

/// Parses `0x`-prefixed (or bare) hex call data. Empty input and `0x` yield empty bytes.
pub fn parse_call_data(input: &str) -> Result<Bytes, AbiError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "0x" {
        return Ok(Bytes::new());
    }
    hex::decode(trimmed)
        .map(Bytes::from)
        .map_err(|err| AbiError::InvalidHex(err.to_string()))
}

pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    IERC20::transferCall { to, amount }.abi_encode().into()
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

pub fn encode_balance_of(owner: Address) -> Bytes {
    IERC20::balanceOfCall { owner }.abi_encode().into()
}

pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
    IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

pub fn encode_decimals() -> Bytes {
    IERC20::decimalsCall {}.abi_encode().into()
}

pub fn encode_symbol() -> Bytes {
    IERC20::symbolCall {}.abi_encode().into()
}

pub fn encode_name() -> Bytes {
    IERC20::nameCall {}.abi_encode().into()
}

/// Splits a comma-separated argument list. Blank input means no arguments.
pub fn split_args(input: &str) -> Vec<&str> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input.split(',').map(str::trim).collect()
}

fn parse_uint(input: &str) -> Result<U256, AbiError> {
    input
        .trim()
        .parse::<U256>()
        .map_err(|_| AbiError::InvalidInteger(input.to_owned()))
}

/// Encodes a call to an ERC-20 function by name. Addresses are hex and
/// amounts are raw integers in the token's smallest unit.
pub fn encode_named_call(function: &str, args: &[&str]) -> Result<Bytes, AbiError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(AbiError::ArgumentCount {
                function: function.to_owned(),
                expected,
                got: args.len(),
            })
        }
    };

    let data = match function {
        "transfer" => {
            arity(2)?;
            IERC20::transferCall {
                to: parse_address(args[0])?,
                amount: parse_uint(args[1])?,
            }
            .abi_encode()
        }
        "approve" => {
            arity(2)?;
            IERC20::approveCall {
                spender: parse_address(args[0])?,
                amount: parse_uint(args[1])?,
            }
            .abi_encode()
        }
        "transferFrom" => {
            arity(3)?;
            IERC20::transferFromCall {
                from: parse_address(args[0])?,
                to: parse_address(args[1])?,
                amount: parse_uint(args[2])?,
            }
            .abi_encode()
        }
        "balanceOf" => {
            arity(1)?;
            IERC20::balanceOfCall {
                owner: parse_address(args[0])?,
            }
            .abi_encode()
        }
        "allowance" => {
            arity(2)?;
            IERC20::allowanceCall {
                owner: parse_address(args[0])?,
                spender: parse_address(args[1])?,
            }
            .abi_encode()
        }
        "decimals" => {
            arity(0)?;
            IERC20::decimalsCall {}.abi_encode()
        }
        "symbol" => {
            arity(0)?;
            IERC20::symbolCall {}.abi_encode()
        }
        "name" => {
            arity(0)?;
            IERC20::nameCall {}.abi_encode()
        }
        "totalSupply" => {
            arity(0)?;
            IERC20::totalSupplyCall {}.abi_encode()
        }
        other => return Err(AbiError::UnknownFunction(other.to_owned())),
    };
    Ok(data.into())
}

/// Renders the return value of an ERC-20 function called by name.
pub fn decode_named_return(function: &str, data: &[u8]) -> Result<String, AbiError> {
    match function {
        "transfer" | "approve" | "transferFrom" => Ok((!decode_uint256(data)?.is_zero()).to_string()),
        "balanceOf" | "allowance" | "totalSupply" => Ok(decode_uint256(data)?.to_string()),
        "decimals" => Ok(decode_uint8(data)?.to_string()),
        "symbol" | "name" => decode_string(data),
        other => Err(AbiError::UnknownFunction(other.to_owned())),
    }
}

/// Reads a single `uint256` return word.
pub fn decode_uint256(data: &[u8]) -> Result<U256, AbiError> {
    if data.len() < 32 {
        return Err(AbiError::InvalidReturnData(data.len()));
    }
    U256::try_from_be_slice(&data[..32]).ok_or(AbiError::InvalidReturnData(data.len()))
}

/// Reads a `uint8` return word, as returned by `decimals()`.
pub fn decode_uint8(data: &[u8]) -> Result<u8, AbiError> {
    let word = decode_uint256(data)?;
    u8::try_from(word).map_err(|_| AbiError::InvalidReturnData(data.len()))
}

/// Reads a dynamic `string` return value, as returned by `symbol()` and `name()`.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    IERC20::symbolCall::abi_decode_returns(data).map_err(|_| AbiError::InvalidReturnData(data.len()))
}

pub(crate) fn param(name: &str, ty: &str, value: impl ToString) -> DecodedParam {
    DecodedParam {
        name: name.to_owned(),
        ty: ty.to_owned(),
        value: value.to_string(),
    }
}

/// Decodes `transfer`, `approve` and `transferFrom` call data, plus the
/// exact-input swaps of [`router`].
///
/// Returns `None` for anything else, including truncated or malformed input
/// carrying a known selector.
pub fn decode_known_call(data: &[u8]) -> Option<DecodedCall> {
    let selector = data.get(..4)?;

    if selector == IERC20::transferCall::SELECTOR {
        let call = IERC20::transferCall::abi_decode(data).ok()?;
        return Some(DecodedCall {
            name: "transfer".to_owned(),
            params: vec![
                param("to", "address", call.to),
                param("amount", "uint256", call.amount),
            ],
        });
    }

    if selector == IERC20::approveCall::SELECTOR {
        let call = IERC20::approveCall::abi_decode(data).ok()?;
        return Some(DecodedCall {
            name: "approve".to_owned(),
            params: vec![
                param("spender", "address", call.spender),
                param("amount", "uint256", call.amount),
            ],
        });
    }

    if selector == IERC20::transferFromCall::SELECTOR {
        let call = IERC20::transferFromCall::abi_decode(data).ok()?;
        return Some(DecodedCall {
            name: "transferFrom".to_owned(),
            params: vec![
                param("from", "address", call.from),
                param("to", "address", call.to),
                param("amount", "uint256", call.amount),
            ],
        });
    }

    router::decode_swap_call(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn transfer_selector_matches_erc20() {
        let data = encode_transfer(addr(0x11), U256::from(5));
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 64);
    }

    #[test]
    fn decodes_transfer_with_named_params() {
        let data = encode_transfer(addr(0x11), U256::from(1_000_000u64));
        let decoded = decode_known_call(&data).expect("transfer should decode");

        assert_eq!(decoded.name, "transfer");
        assert_eq!(decoded.params.len(), 2);
        assert_eq!(decoded.params[0].name, "to");
        assert_eq!(decoded.params[0].ty, "address");
        assert_eq!(decoded.params[0].value, addr(0x11).to_string());
        assert_eq!(decoded.params[1].value, "1000000");
    }

    #[test]
    fn decodes_approve_and_transfer_from() {
        let approve = decode_known_call(&encode_approve(addr(0x22), U256::ZERO)).unwrap();
        assert_eq!(approve.name, "approve");
        assert_eq!(approve.params[0].name, "spender");
        assert_eq!(approve.params[1].value, "0");

        let data = IERC20::transferFromCall {
            from: addr(0x01),
            to: addr(0x02),
            amount: U256::from(7),
        }
        .abi_encode();
        let transfer_from = decode_known_call(&data).unwrap();
        assert_eq!(transfer_from.name, "transferFrom");
        assert_eq!(transfer_from.params.len(), 3);
        assert_eq!(transfer_from.params[2].value, "7");
    }

    #[test]
    fn unknown_or_truncated_data_does_not_decode() {
        assert!(decode_known_call(&[]).is_none());
        assert!(decode_known_call(&[0xde, 0xad, 0xbe, 0xef, 0x00]).is_none());

        let data = encode_transfer(addr(0x11), U256::from(1));
        assert!(decode_known_call(&data[..20]).is_none());
        assert!(decode_known_call(&encode_balance_of(addr(0x11))).is_none());
    }

    #[test]
    fn parses_call_data_and_addresses() {
        assert!(parse_call_data("0x").unwrap().is_empty());
        assert!(parse_call_data("").unwrap().is_empty());
        assert_eq!(parse_call_data("0x70a08231").unwrap().len(), 4);
        assert!(matches!(parse_call_data("0xzz"), Err(AbiError::InvalidHex(_))));

        let lower = parse_address("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        let upper = parse_address("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        assert_eq!(lower, upper);
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn decodes_return_words() {
        let mut word = [0_u8; 32];
        word[31] = 18;
        assert_eq!(decode_uint256(&word).unwrap(), U256::from(18));
        assert_eq!(decode_uint8(&word).unwrap(), 18);
        assert_eq!(decode_uint256(&word[..8]), Err(AbiError::InvalidReturnData(8)));
    }

    fn string_return(value: &str) -> Vec<u8> {
        let mut data = U256::from(0x20).to_be_bytes::<32>().to_vec();
        data.extend_from_slice(&U256::from(value.len()).to_be_bytes::<32>());
        let mut tail = value.as_bytes().to_vec();
        tail.resize(value.len().div_ceil(32) * 32, 0);
        data.extend_from_slice(&tail);
        data
    }

    #[test]
    fn named_calls_match_the_typed_encoders() {
        let owner = addr(0x11);
        let spender = addr(0x22);
        assert_eq!(
            encode_named_call("balanceOf", &[owner.to_string().as_str()]).unwrap(),
            encode_balance_of(owner)
        );
        assert_eq!(
            encode_named_call("approve", &split_args(&format!("{spender}, 1000"))).unwrap(),
            encode_approve(spender, U256::from(1000))
        );
        assert_eq!(
            encode_named_call("transfer", &[spender.to_string().as_str(), "0x10"]).unwrap(),
            encode_transfer(spender, U256::from(16))
        );
        assert_eq!(encode_named_call("decimals", &split_args("  ")).unwrap(), encode_decimals());
    }

    #[test]
    fn named_calls_reject_bad_input() {
        assert_eq!(
            encode_named_call("mint", &[]),
            Err(AbiError::UnknownFunction("mint".to_owned()))
        );
        assert_eq!(
            encode_named_call("allowance", &["0x11"]),
            Err(AbiError::ArgumentCount {
                function: "allowance".to_owned(),
                expected: 2,
                got: 1,
            })
        );
        assert!(matches!(
            encode_named_call("transfer", &[addr(0x11).to_string().as_str(), "lots"]),
            Err(AbiError::InvalidInteger(_))
        ));
        assert!(matches!(
            encode_named_call("balanceOf", &["nobody"]),
            Err(AbiError::InvalidAddress(_))
        ));
    }

    #[test]
    fn named_returns_are_rendered_by_type() {
        let mut word = [0_u8; 32];
        word[31] = 1;
        assert_eq!(decode_named_return("approve", &word).unwrap(), "true");
        assert_eq!(decode_named_return("balanceOf", &word).unwrap(), "1");
        assert_eq!(decode_named_return("decimals", &word).unwrap(), "1");
        assert_eq!(decode_named_return("symbol", &string_return("USDC")).unwrap(), "USDC");
        assert_eq!(decode_string(&string_return("USD Coin")).unwrap(), "USD Coin");
        assert!(decode_named_return("symbol", &word).is_err());
    }
}
