//! Best-effort decoding of a pending transaction before it goes to the wallet.
//!
//! Nothing here mutates the session. Failures to estimate gas or read fee
//! data degrade the preview instead of failing it.

use alloy_primitives::{Address, Bytes, U256, hex};
use async_trait::async_trait;
use dd_abi::units::{format_ether, format_gwei, parse_gwei};
use dd_api_types::{DecodedCall, GasEstimate, GasLevel, TransactionPreview};
use dd_provider::FeeData;
use tracing::debug;

use crate::{SessionError, SignerHandle};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTransaction {
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

/// What the decoder needs from the wallet connection.
#[async_trait]
pub trait PreviewContext: Send + Sync {
    fn chain_id(&self) -> Option<u64>;
    async fn estimate_gas(&self, tx: &PendingTransaction) -> Result<u64, SessionError>;
    async fn fee_data(&self) -> Result<FeeData, SessionError>;
}

/// A connected signer together with the chain the session is on.
pub struct SignerPreviewContext<'a> {
    pub signer: &'a SignerHandle,
    pub chain_id: Option<u64>,
}

#[async_trait]
impl PreviewContext for SignerPreviewContext<'_> {
    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn estimate_gas(&self, tx: &PendingTransaction) -> Result<u64, SessionError> {
        self.signer
            .estimate_gas(tx.to, tx.value, tx.data.clone())
            .await
    }

    async fn fee_data(&self) -> Result<FeeData, SessionError> {
        self.signer.fee_data().await
    }
}

pub async fn decode_transaction<C>(ctx: &C, tx: &PendingTransaction) -> TransactionPreview
where
    C: PreviewContext + ?Sized,
{
    let is_contract = tx.to.is_some() && !tx.data.is_empty();

    let function = is_contract
        .then(|| dd_abi::decode_known_call(&tx.data).unwrap_or_else(DecodedCall::unknown));

    let gas_limit = if tx.to.is_some() {
        match ctx.estimate_gas(tx).await {
            Ok(gas) => GasEstimate::Estimated { gas },
            Err(err) => {
                debug!(error = %err, "gas estimation failed");
                GasEstimate::Unavailable
            }
        }
    } else {
        GasEstimate::NotRequested
    };

    let fees = match ctx.fee_data().await {
        Ok(fees) => fees,
        Err(err) => {
            debug!(error = %err, "fee data unavailable");
            FeeData::default()
        }
    };
    let gas_price = fees.gas_price.map(format_gwei);
    let estimated_cost = calculate_transaction_cost(&gas_limit, gas_price.as_deref());

    TransactionPreview {
        to: tx.to,
        value: if tx.value.is_zero() {
            "0".to_owned()
        } else {
            format_ether(tx.value)
        },
        data: hex::encode_prefixed(&tx.data),
        chain_id: ctx.chain_id(),
        is_contract,
        has_data: is_contract,
        function,
        gas_limit,
        gas_price,
        max_fee_per_gas: fees.max_fee_per_gas.map(format_gwei),
        max_priority_fee_per_gas: fees.max_priority_fee_per_gas.map(format_gwei),
        estimated_cost,
    }
}

/// Total cost in ether of `gas_limit` units at `gas_price_gwei`.
pub fn calculate_transaction_cost(gas_limit: &GasEstimate, gas_price_gwei: Option<&str>) -> Option<String> {
    let GasEstimate::Estimated { gas } = gas_limit else {
        return None;
    };
    let price = parse_gwei(gas_price_gwei?).ok()?;
    let total = price.checked_mul(U256::from(*gas))?;
    Some(format_ether(total))
}

/// Shortened `0x1234...abcd` form, or `N/A`.
pub fn format_address(address: Option<&Address>) -> String {
    let Some(address) = address else {
        return "N/A".to_owned();
    };
    let full = hex::encode_prefixed(address);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

pub fn classify_gas_price(gwei: Option<f64>) -> GasLevel {
    GasLevel::classify(gwei)
}

/// Gas level of a wei-denominated price.
pub fn classify_gas_price_wei(wei: Option<u128>) -> GasLevel {
    classify_gas_price(wei.map(|wei| wei as f64 / 1e9))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use dd_api_types::UNKNOWN_FUNCTION;
    use dd_provider::{ProviderError, codes};

    struct FixedContext {
        gas: Option<u64>,
        fees: Option<FeeData>,
    }

    #[async_trait]
    impl PreviewContext for FixedContext {
        fn chain_id(&self) -> Option<u64> {
            Some(11_155_111)
        }

        async fn estimate_gas(&self, _tx: &PendingTransaction) -> Result<u64, SessionError> {
            self.gas
                .ok_or_else(|| ProviderError::rpc(codes::EXECUTION_ERROR, "execution reverted").into())
        }

        async fn fee_data(&self) -> Result<FeeData, SessionError> {
            self.fees
                .ok_or_else(|| ProviderError::Transport("offline".to_owned()).into())
        }
    }

    fn healthy() -> FixedContext {
        FixedContext {
            gas: Some(21_000),
            fees: Some(FeeData {
                gas_price: Some(20_000_000_000),
                max_fee_per_gas: Some(30_000_000_000),
                max_priority_fee_per_gas: Some(1_500_000_000),
            }),
        }
    }

    #[tokio::test]
    async fn previews_plain_native_transfer() -> Result<()> {
        let tx = PendingTransaction {
            to: Some(Address::repeat_byte(0x42)),
            value: dd_abi::units::parse_ether("0.5")?,
            data: Bytes::new(),
        };
        let preview = decode_transaction(&healthy(), &tx).await;

        assert_eq!(preview.value, "0.5");
        assert_eq!(preview.data, "0x");
        assert_eq!(preview.chain_id, Some(11_155_111));
        assert!(!preview.is_contract);
        assert!(preview.function.is_none());
        assert_eq!(preview.gas_limit, GasEstimate::Estimated { gas: 21_000 });
        assert_eq!(preview.gas_price.as_deref(), Some("20.0"));
        assert_eq!(preview.max_priority_fee_per_gas.as_deref(), Some("1.5"));
        assert_eq!(preview.estimated_cost.as_deref(), Some("0.00042"));
        Ok(())
    }

    #[tokio::test]
    async fn decodes_known_erc20_calls_and_falls_back_to_raw_data() {
        let token = Some(Address::repeat_byte(0x77));
        let approve = PendingTransaction {
            to: token,
            value: U256::ZERO,
            data: dd_abi::encode_approve(Address::repeat_byte(0x11), U256::from(5)),
        };
        let preview = decode_transaction(&healthy(), &approve).await;
        assert_eq!(preview.value, "0");
        assert!(preview.is_contract && preview.has_data);
        let function = preview.function.expect("decoded");
        assert_eq!(function.name, "approve");
        assert_eq!(function.params[1].value, "5");

        let opaque = PendingTransaction {
            to: token,
            value: U256::ZERO,
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        };
        let preview = decode_transaction(&healthy(), &opaque).await;
        assert_eq!(preview.data, "0xdeadbeef");
        assert_eq!(preview.function.map(|f| f.name).as_deref(), Some(UNKNOWN_FUNCTION));
    }

    #[tokio::test]
    async fn estimation_and_fee_failures_degrade_gracefully() {
        let ctx = FixedContext { gas: None, fees: None };
        let tx = PendingTransaction {
            to: Some(Address::repeat_byte(0x42)),
            ..Default::default()
        };
        let preview = decode_transaction(&ctx, &tx).await;
        assert_eq!(preview.gas_limit, GasEstimate::Unavailable);
        assert_eq!(preview.gas_limit.to_string(), "Unable to estimate");
        assert!(preview.gas_price.is_none());
        assert!(preview.estimated_cost.is_none());

        let deployment = PendingTransaction::default();
        let preview = decode_transaction(&healthy(), &deployment).await;
        assert_eq!(preview.gas_limit, GasEstimate::NotRequested);
    }

    #[test]
    fn formats_addresses_and_costs() {
        let address: Address = "0x1234567890abcdef1234567890abcdef1234abcd".parse().unwrap();
        assert_eq!(format_address(Some(&address)), "0x1234...abcd");
        assert_eq!(format_address(None), "N/A");

        let gas = GasEstimate::Estimated { gas: 100_000 };
        assert_eq!(calculate_transaction_cost(&gas, Some("2.5")).as_deref(), Some("0.00025"));
        assert!(calculate_transaction_cost(&GasEstimate::Unavailable, Some("2.5")).is_none());
        assert!(calculate_transaction_cost(&gas, None).is_none());
    }

    #[test]
    fn classifies_gas_levels() {
        assert_eq!(classify_gas_price(Some(12.0)), GasLevel::Low);
        assert_eq!(classify_gas_price(Some(20.0)), GasLevel::Medium);
        assert_eq!(classify_gas_price(Some(49.9)), GasLevel::Medium);
        assert_eq!(classify_gas_price(Some(50.0)), GasLevel::High);
        assert_eq!(classify_gas_price(None), GasLevel::Unknown);
        assert_eq!(classify_gas_price_wei(Some(30_000_000_000)), GasLevel::Medium);
    }
}
