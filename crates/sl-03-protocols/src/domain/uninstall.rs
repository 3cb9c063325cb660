//! # Uninstall Protocol
//!
//! Resolves an app's final outcome through its outcome logic, credits the
//! payout back to free balance, and removes the app — attested by a fresh
//! free balance set-state commitment both parties sign.
//!
//! Targeting the free balance's own identity hash fails before any
//! signing round begins; the free balance is structurally protected.

use shared_types::{ProtocolMessage, ProtocolParams, StateChannelJson, UninstallParams};
use sl_01_channel_model::{ChannelError, StateChannel};
use sl_02_commitments::{assert_signed_by, SetStateCommitment};
use uuid::Uuid;

use super::common::{checkout_channel, expect_seq, free_balance_set_state, take_signature};
use super::context::{Execution, ProtocolContext};
use super::errors::ProtocolError;

struct UninstallStep {
    next_channel: StateChannel,
    fb_set_state: SetStateCommitment,
}

/// Derive the post-uninstall aggregate and the free balance attestation.
async fn build_uninstall_step(
    ctx: &ProtocolContext,
    channel: &StateChannel,
    params: &UninstallParams,
) -> Result<UninstallStep, ProtocolError> {
    // Checked before any outcome evaluation or signing.
    if channel.is_free_balance(&params.identity_hash) {
        return Err(ProtocolError::Channel(
            ChannelError::CannotUninstallFreeBalance {
                multisig_address: channel.multisig_address(),
            },
        ));
    }
    let app = channel.get_app_instance(&params.identity_hash)?;
    let increments = ctx.app_logic.compute_outcome(app).await?;
    let next_channel =
        channel.remove_app_and_increment_free_balance(&params.identity_hash, &increments)?;
    let fb_set_state = free_balance_set_state(ctx, &next_channel)?;
    Ok(UninstallStep {
        next_channel,
        fb_set_state,
    })
}

async fn persist(
    ctx: &ProtocolContext,
    step: &UninstallStep,
    identity_hash: shared_types::Bytes32,
) -> Result<(), ProtocolError> {
    ctx.store
        .remove_app_instance(
            &step.next_channel.to_json(),
            identity_hash,
            &step.fb_set_state.to_json(),
        )
        .await?;
    Ok(())
}

/// Initiator half.
pub async fn initiate(
    ctx: &ProtocolContext,
    params: UninstallParams,
) -> Result<StateChannelJson, ProtocolError> {
    let mut execution = Execution::start(
        shared_types::ProtocolName::Uninstall,
        params.multisig_address,
        Uuid::new_v4(),
    );

    let result = async {
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let mut step = build_uninstall_step(ctx, &channel, &params).await?;

        let my_signature = ctx.signer.sign(&step.fb_set_state.hash_to_sign()).await?;

        let me = ctx.signer.public_identifier();
        let [initiator_identifier, responder_identifier] = channel.user_identifiers();
        let counterparty_identifier = if me == initiator_identifier {
            responder_identifier
        } else {
            initiator_identifier
        };
        let counterparty_address = shared_crypto::signer_address_of(&counterparty_identifier)
            .map_err(ChannelError::from)?;

        execution.awaiting_counterparty();
        let response = ctx
            .messaging
            .send_and_wait(
                ProtocolMessage {
                    process_id: execution.process_id(),
                    seq: 1,
                    from: me,
                    to: counterparty_identifier,
                    params: ProtocolParams::Uninstall(params),
                    signatures: vec![my_signature],
                    identity_hash: Some(params.identity_hash),
                },
                ctx.timeouts.round_timeout,
            )
            .await?;

        expect_seq(&response, 2)?;
        let their_signature = take_signature(&response, 0)?;
        assert_signed_by(
            &step.fb_set_state.hash_to_sign(),
            &their_signature,
            counterparty_address,
        )?;

        step.fb_set_state.add_signature(my_signature)?;
        step.fb_set_state.add_signature(their_signature)?;

        persist(ctx, &step, params.identity_hash).await?;
        Ok(step.next_channel.to_json())
    }
    .await;

    match result {
        Ok(channel) => {
            execution.committed();
            Ok(channel)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}

/// Responder half: recompute the identical outcome, verify, sign,
/// persist, reply.
pub async fn respond(
    ctx: &ProtocolContext,
    message: ProtocolMessage,
) -> Result<StateChannelJson, ProtocolError> {
    let ProtocolParams::Uninstall(params) = message.params.clone() else {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq: 1,
            actual_seq: message.seq,
        });
    };
    let mut execution = Execution::start(
        shared_types::ProtocolName::Uninstall,
        params.multisig_address,
        message.process_id,
    );

    let result = async {
        expect_seq(&message, 1)?;
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let mut step = build_uninstall_step(ctx, &channel, &params).await?;

        let their_address =
            shared_crypto::signer_address_of(&message.from).map_err(ChannelError::from)?;
        let their_signature = take_signature(&message, 0)?;
        assert_signed_by(
            &step.fb_set_state.hash_to_sign(),
            &their_signature,
            their_address,
        )?;

        let my_signature = ctx.signer.sign(&step.fb_set_state.hash_to_sign()).await?;
        step.fb_set_state.add_signature(their_signature)?;
        step.fb_set_state.add_signature(my_signature)?;

        persist(ctx, &step, params.identity_hash).await?;

        ctx.messaging
            .send(ProtocolMessage {
                process_id: message.process_id,
                seq: 2,
                from: ctx.signer.public_identifier(),
                to: message.from,
                params: message.params.clone(),
                signatures: vec![my_signature],
                identity_hash: Some(params.identity_hash),
            })
            .await?;
        Ok(step.next_channel.to_json())
    }
    .await;

    match result {
        Ok(channel) => {
            execution.committed();
            Ok(channel)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}
