//! # Static Registry and Chain Adapters
//!
//! A fixed app registry populated at startup and a chain provider backed
//! by a configurable balance table. Server deployments would point these
//! ports at a database-backed registry and an RPC provider.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use shared_types::{Address, U256};

use crate::ports::{AppRegistry, AppRegistryInfo, ChainError, ChainProvider};

/// App registry built once at startup.
#[derive(Default)]
pub struct StaticAppRegistry {
    apps: HashMap<Address, AppRegistryInfo>,
    supported_tokens: Vec<Address>,
}

impl StaticAppRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_app(mut self, info: AppRegistryInfo) -> Self {
        self.apps.insert(info.app_definition_address, info);
        self
    }

    #[must_use]
    pub fn with_supported_token(mut self, token_address: Address) -> Self {
        self.supported_tokens.push(token_address);
        self
    }
}

impl AppRegistry for StaticAppRegistry {
    fn get_app_info(&self, app_definition: Address) -> Option<AppRegistryInfo> {
        self.apps.get(&app_definition).cloned()
    }

    fn supported_token_addresses(&self) -> Vec<Address> {
        self.supported_tokens.clone()
    }
}

/// Chain provider answering balance queries from a fixed table.
pub struct StaticChainProvider {
    balances: RwLock<HashMap<(Address, Address), U256>>,
    default_balance: U256,
}

impl StaticChainProvider {
    /// Unknown `(multisig, token)` pairs report `default_balance`.
    #[must_use]
    pub fn new(default_balance: U256) -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            default_balance,
        }
    }

    pub fn set_balance(&self, multisig_address: Address, token_address: Address, amount: U256) {
        self.balances
            .write()
            .insert((multisig_address, token_address), amount);
    }
}

#[async_trait]
impl ChainProvider for StaticChainProvider {
    async fn multisig_balance(
        &self,
        multisig_address: Address,
        token_address: Address,
    ) -> Result<U256, ChainError> {
        Ok(self
            .balances
            .read()
            .get(&(multisig_address, token_address))
            .copied()
            .unwrap_or(self.default_balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::OutcomeType;

    #[test]
    fn test_registry_lookup() {
        let app_definition = Address([0x55; 20]);
        let registry = StaticAppRegistry::new()
            .with_app(AppRegistryInfo {
                name: "SimpleTransferApp".into(),
                app_definition_address: app_definition,
                state_encoding: "tuple(uint256 c)".into(),
                action_encoding: None,
                outcome_type: OutcomeType::SingleAssetTwoPartyCoinTransfer,
            })
            .with_supported_token(Address::zero());

        assert!(registry.get_app_info(app_definition).is_some());
        assert!(registry.get_app_info(Address([0x56; 20])).is_none());
        assert_eq!(registry.supported_token_addresses(), vec![Address::zero()]);
    }

    #[tokio::test]
    async fn test_chain_provider_balances() {
        let chain = StaticChainProvider::new(U256::from(100u64));
        let multisig = Address([0x44; 20]);
        let token = Address([0x77; 20]);

        assert_eq!(
            chain.multisig_balance(multisig, token).await.unwrap(),
            U256::from(100u64)
        );
        chain.set_balance(multisig, token, U256::from(3u64));
        assert_eq!(
            chain.multisig_balance(multisig, token).await.unwrap(),
            U256::from(3u64)
        );
    }
}
