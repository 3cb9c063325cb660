//! Shared helpers for the protocol machines.

use shared_types::{Address, Bytes32, ProtocolMessage, SignatureBytes};
use sl_01_channel_model::{AppInstance, StateChannel};
use sl_02_commitments::SetStateCommitment;

use super::context::ProtocolContext;
use super::errors::ProtocolError;

/// Check out the committed channel aggregate for `multisig_address`.
pub async fn checkout_channel(
    ctx: &ProtocolContext,
    multisig_address: Address,
) -> Result<StateChannel, ProtocolError> {
    let json = ctx
        .store
        .get_state_channel(multisig_address)
        .await?
        .ok_or(ProtocolError::ChannelNotFound { multisig_address })?;
    Ok(StateChannel::from_json(json)?)
}

/// Build the set-state attestation over the channel's current free
/// balance app state.
pub fn free_balance_set_state(
    ctx: &ProtocolContext,
    channel: &StateChannel,
) -> Result<SetStateCommitment, ProtocolError> {
    let free_balance_app = channel.free_balance_app_instance();
    Ok(SetStateCommitment::new(
        ctx.network.challenge_registry,
        free_balance_app.identity(),
        free_balance_app.state_hash(),
        free_balance_app.latest_version_number(),
        free_balance_app.state_timeout(),
    )?)
}

/// Build the set-state attestation over one app's latest state.
pub fn app_set_state(
    ctx: &ProtocolContext,
    app: &AppInstance,
) -> Result<SetStateCommitment, ProtocolError> {
    Ok(SetStateCommitment::new(
        ctx.network.challenge_registry,
        app.identity(),
        app.state_hash(),
        app.latest_version_number(),
        app.state_timeout(),
    )?)
}

/// The `index`-th signature the counterparty attached to this round.
pub fn take_signature(
    message: &ProtocolMessage,
    index: usize,
) -> Result<SignatureBytes, ProtocolError> {
    message
        .signatures
        .get(index)
        .copied()
        .ok_or(ProtocolError::MissingCounterpartySignature {
            protocol: message.protocol(),
            seq: message.seq,
        })
}

/// Reject out-of-order rounds.
pub fn expect_seq(message: &ProtocolMessage, expected_seq: u8) -> Result<(), ProtocolError> {
    if message.seq != expected_seq {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq,
            actual_seq: message.seq,
        });
    }
    Ok(())
}

/// The identity hash named by a protocol message's parameters, for error
/// context.
#[must_use]
pub fn message_identity_hash(message: &ProtocolMessage) -> Option<Bytes32> {
    use shared_types::ProtocolParams;
    match &message.params {
        ProtocolParams::Install(p) => Some(p.identity_hash),
        ProtocolParams::TakeAction(p) => Some(p.identity_hash),
        ProtocolParams::Uninstall(p) => Some(p.identity_hash),
        ProtocolParams::Setup(_) | ProtocolParams::Propose(_) | ProtocolParams::Sync(_) => {
            message.identity_hash
        }
    }
}
