//! # On-Chain Provider Port
//!
//! The narrow slice of chain access the engine needs: the multisig's
//! balance per token, used as an install-time sanity bound. Deposit and
//! withdraw broadcast flows live outside the engine.

use async_trait::async_trait;
use thiserror::Error;

use shared_types::{Address, U256};

/// Errors from the chain collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain query failed: {0}")]
    QueryFailed(String),
}

/// Read-only chain queries.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// On-chain balance of `token` held by the multisig (native asset for
    /// the zero address).
    async fn multisig_balance(
        &self,
        multisig_address: Address,
        token_address: Address,
    ) -> Result<U256, ChainError>;
}
