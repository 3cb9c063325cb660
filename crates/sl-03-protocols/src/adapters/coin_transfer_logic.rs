//! # Coin-Transfer App Logic Adapter
//!
//! Transition and outcome functions for the simple two-party transfer
//! app: state holds two coin-transfer entries (sender first, receiver
//! second), an action moves value from sender to receiver, and the
//! outcome pays each entry back to free balance in the app's deposit
//! token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_types::{CoinTransfer, InterpreterParams, TokenIndexedBalances, U256};
use sl_01_channel_model::AppInstance;

use crate::ports::{AppLogic, AppLogicError};

/// State document of the transfer app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferAppState {
    /// `[sender, receiver]` in fixed order.
    coin_transfers: Vec<CoinTransfer>,
}

/// Action document of the transfer app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferAction {
    transfer_amount: U256,
}

fn parse_state(state: &Value) -> Result<TransferAppState, AppLogicError> {
    let parsed: TransferAppState = serde_json::from_value(state.clone())
        .map_err(|err| AppLogicError::MalformedState(err.to_string()))?;
    if parsed.coin_transfers.len() != 2 {
        return Err(AppLogicError::MalformedState(format!(
            "expected 2 coin transfers, got {}",
            parsed.coin_transfers.len()
        )));
    }
    Ok(parsed)
}

/// Transfer app logic.
#[derive(Default)]
pub struct CoinTransferAppLogic;

impl CoinTransferAppLogic {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AppLogic for CoinTransferAppLogic {
    async fn apply_action(
        &self,
        app: &AppInstance,
        action: &Value,
    ) -> Result<Value, AppLogicError> {
        let mut state = parse_state(app.latest_state())?;
        let action: TransferAction = serde_json::from_value(action.clone())
            .map_err(|err| AppLogicError::InvalidAction(err.to_string()))?;

        let sender_balance = state.coin_transfers[0].amount;
        if sender_balance < action.transfer_amount {
            return Err(AppLogicError::InvalidAction(format!(
                "transfer of {} exceeds sender balance {sender_balance}",
                action.transfer_amount
            )));
        }
        state.coin_transfers[0].amount = sender_balance - action.transfer_amount;
        state.coin_transfers[1].amount =
            state.coin_transfers[1].amount + action.transfer_amount;

        serde_json::to_value(state).map_err(|err| AppLogicError::MalformedState(err.to_string()))
    }

    async fn compute_outcome(
        &self,
        app: &AppInstance,
    ) -> Result<TokenIndexedBalances, AppLogicError> {
        let state = parse_state(app.latest_state())?;
        let InterpreterParams::SingleAssetTwoPartyCoinTransfer { token_address, .. } =
            app.interpreter_params()
        else {
            return Err(AppLogicError::NoOutcome(format!(
                "transfer app cannot resolve outcome type {}",
                app.outcome_type()
            )));
        };

        let mut outcome = TokenIndexedBalances::new();
        let entry = outcome.entry(*token_address).or_default();
        for transfer in &state.coin_transfers {
            if !transfer.amount.is_zero() {
                let current = entry.get(&transfer.to).copied().unwrap_or_else(U256::zero);
                entry.insert(transfer.to, current + transfer.amount);
            }
        }
        if entry.is_empty() {
            outcome.remove(token_address);
        }
        Ok(outcome)
    }
}
