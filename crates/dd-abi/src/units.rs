use alloy_primitives::U256;
use alloy_primitives::utils::{self, ParseUnits};

use crate::AbiError;

pub const ETHER_DECIMALS: u8 = 18;
pub const GWEI_DECIMALS: u8 = 9;

/// Formats a base-unit amount with trailing fractional zeros removed,
/// keeping at least one fractional digit (`1.0`, `0.25`).
pub fn format_units(value: U256, decimals: u8) -> String {
    let formatted = match utils::format_units(value, decimals) {
        Ok(formatted) => formatted,
        Err(_) => return value.to_string(),
    };

    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{formatted}.0"),
    }
}

pub fn format_ether(value: U256) -> String {
    format_units(value, ETHER_DECIMALS)
}

pub fn format_gwei(value: u128) -> String {
    format_units(U256::from(value), GWEI_DECIMALS)
}

/// Parses a non-negative decimal amount into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, AbiError> {
    let trimmed = amount.trim();
    let invalid = |reason: String| AbiError::InvalidAmount {
        amount: amount.to_owned(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("amount is empty".to_owned()));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount cannot be negative".to_owned()));
    }

    match utils::parse_units(trimmed, decimals).map_err(|err| invalid(err.to_string()))? {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(invalid("amount cannot be negative".to_owned())),
    }
}

pub fn parse_ether(amount: &str) -> Result<U256, AbiError> {
    parse_units(amount, ETHER_DECIMALS)
}

pub fn parse_gwei(amount: &str) -> Result<U256, AbiError> {
    parse_units(amount, GWEI_DECIMALS)
}
