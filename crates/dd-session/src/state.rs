use alloy_primitives::{Address, U256};
use dd_abi::units::format_ether;
use dd_api_types::SessionSnapshot;
use dd_chains::ChainRegistry;

use crate::{ProviderHandle, SignerHandle};

/// The session record. Owned exclusively by the session actor.
///
/// `account == None` implies every other connection field is `None` too.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub balance: Option<U256>,
    pub provider: Option<ProviderHandle>,
    pub signer: Option<SignerHandle>,
    pub is_connecting: bool,
    pub last_error: Option<String>,
    pub manually_disconnected: bool,
}

impl Session {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    /// Resets the connection fields. Flags are left to the caller.
    pub fn clear_connection(&mut self) {
        self.account = None;
        self.chain_id = None;
        self.balance = None;
        self.provider = None;
        self.signer = None;
    }

    pub fn snapshot(&self, registry: &ChainRegistry, provider_installed: bool) -> SessionSnapshot {
        SessionSnapshot {
            account: self.account,
            chain_id: self.chain_id,
            chain_name: self.chain_id.map(|id| registry.display_name(id)),
            balance: self.balance.map(format_ether),
            native_symbol: self
                .chain_id
                .map(|id| registry.native_currency(id).symbol),
            is_connecting: self.is_connecting,
            last_error: self.last_error.clone(),
            manually_disconnected: self.manually_disconnected,
            provider_installed,
            generation: self.provider.as_ref().map(ProviderHandle::generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_session_snapshot_is_empty() {
        let registry = ChainRegistry::builtin();
        let mut session = Session {
            account: Some(Address::repeat_byte(1)),
            chain_id: Some(dd_chains::POLYGON),
            balance: Some(U256::from(10u64).pow(U256::from(18))),
            manually_disconnected: false,
            ..Default::default()
        };

        let snapshot = session.snapshot(&registry, true);
        assert_eq!(snapshot.chain_name.as_deref(), Some("Polygon Mainnet"));
        assert_eq!(snapshot.native_symbol.as_deref(), Some("MATIC"));
        assert_eq!(snapshot.balance.as_deref(), Some("1.0"));

        session.clear_connection();
        let snapshot = session.snapshot(&registry, true);
        assert!(!snapshot.is_connected());
        assert!(snapshot.chain_id.is_none() && snapshot.balance.is_none());
        assert!(snapshot.generation.is_none());
    }
}
