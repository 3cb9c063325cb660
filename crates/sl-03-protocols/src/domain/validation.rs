//! # Propose-Time Validation
//!
//! Funding-policy checks run before any lock is acquired or message is
//! sent. Rejections here surface synchronously to the caller and leave no
//! trace in the channel.

use shared_types::{Address, CoinTransfer, ProposeParams, U256};

use crate::ports::AppRegistryInfo;

use super::errors::ProtocolError;

/// Reject proposals whose declared encodings disagree with the registry
/// entry for the app definition, whose deposit tokens are unsupported, or
/// whose deposits are zero on both sides.
pub fn common_app_proposal_validation(
    params: &ProposeParams,
    registry_info: &AppRegistryInfo,
    supported_token_addresses: &[Address],
) -> Result<(), ProtocolError> {
    if params.abi_encodings.state_encoding != registry_info.state_encoding
        || params.abi_encodings.action_encoding != registry_info.action_encoding
        || params.outcome_type != registry_info.outcome_type
    {
        return Err(ProtocolError::AppRegistryMismatch {
            app_definition: params.app_definition,
            detail: format!(
                "declared encodings/outcome do not match registry entry {}",
                registry_info.name
            ),
        });
    }

    for token_address in [
        params.initiator_deposit_token_address,
        params.responder_deposit_token_address,
    ] {
        if !supported_token_addresses.contains(&token_address) {
            return Err(ProtocolError::UnsupportedToken { token_address });
        }
    }

    if params.initiator_deposit.is_zero() && params.responder_deposit.is_zero() {
        return Err(ProtocolError::ZeroDeposits);
    }

    Ok(())
}

/// The initial in-app transfers must match the declared deposits exactly.
pub fn base_coin_transfer_validation(
    initiator_deposit: U256,
    responder_deposit: U256,
    initiator_transfer: &CoinTransfer,
    responder_transfer: &CoinTransfer,
) -> Result<(), ProtocolError> {
    if initiator_transfer.amount != initiator_deposit {
        return Err(ProtocolError::DepositMismatch {
            deposit: initiator_deposit,
            transfer: initiator_transfer.amount,
        });
    }
    if responder_transfer.amount != responder_deposit {
        return Err(ProtocolError::DepositMismatch {
            deposit: responder_deposit,
            transfer: responder_transfer.amount,
        });
    }
    Ok(())
}

/// Validation for apps where the initiator is a unidirectional sender and
/// the responder only receives: the responder deposit must be zero and
/// the initiator deposit strictly positive.
pub fn unidirectional_coin_transfer_validation(
    initiator_deposit: U256,
    responder_deposit: U256,
    initiator_transfer: &CoinTransfer,
    responder_transfer: &CoinTransfer,
) -> Result<(), ProtocolError> {
    base_coin_transfer_validation(
        initiator_deposit,
        responder_deposit,
        initiator_transfer,
        responder_transfer,
    )?;
    if !responder_deposit.is_zero() {
        return Err(ProtocolError::NonZeroResponderDeposit {
            deposit: responder_deposit,
        });
    }
    if initiator_deposit.is_zero() {
        return Err(ProtocolError::NonPositiveInitiatorDeposit {
            deposit: initiator_deposit,
        });
    }
    Ok(())
}
