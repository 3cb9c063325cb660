//! # Take-Action Protocol
//!
//! Applies an app-specific action through the app's own transition logic
//! (an external pure function both parties run independently), producing
//! the next state at an incremented version, attested by a fresh
//! set-state commitment both parties sign.

use shared_types::{AppInstanceJson, ProtocolMessage, ProtocolParams, TakeActionParams};
use sl_01_channel_model::{AppInstance, StateChannel};
use sl_02_commitments::{assert_signed_by, SetStateCommitment};
use uuid::Uuid;

use super::common::{app_set_state, checkout_channel, expect_seq, take_signature};
use super::context::{Execution, ProtocolContext};
use super::errors::ProtocolError;

struct ActionStep {
    next_channel: StateChannel,
    next_app: AppInstance,
    set_state: SetStateCommitment,
}

/// Run the app's transition and derive the attested successor state.
async fn build_action_step(
    ctx: &ProtocolContext,
    channel: &StateChannel,
    params: &TakeActionParams,
) -> Result<ActionStep, ProtocolError> {
    let app = channel.get_app_instance(&params.identity_hash)?;
    let next_state = ctx.app_logic.apply_action(app, &params.action).await?;
    let next_app = app.lock_state(
        params.action.clone(),
        next_state,
        app.latest_version_number() + 1,
    )?;
    let set_state = app_set_state(ctx, &next_app)?;
    let next_channel = channel.update_app(next_app.clone())?;
    Ok(ActionStep {
        next_channel,
        next_app,
        set_state,
    })
}

async fn persist(ctx: &ProtocolContext, step: &ActionStep) -> Result<(), ProtocolError> {
    ctx.store
        .update_app_instance(
            &step.next_channel.to_json(),
            &step.next_app.to_json(),
            &step.set_state.to_json(),
        )
        .await?;
    Ok(())
}

/// Initiator half.
pub async fn initiate(
    ctx: &ProtocolContext,
    params: TakeActionParams,
) -> Result<AppInstanceJson, ProtocolError> {
    let mut execution = Execution::start(
        shared_types::ProtocolName::TakeAction,
        params.multisig_address,
        Uuid::new_v4(),
    );

    let result = async {
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let mut step = build_action_step(ctx, &channel, &params).await?;

        let my_signature = ctx.signer.sign(&step.set_state.hash_to_sign()).await?;

        let me = ctx.signer.public_identifier();
        let [initiator_identifier, responder_identifier] = channel.user_identifiers();
        let counterparty_identifier = if me == initiator_identifier {
            responder_identifier
        } else {
            initiator_identifier
        };
        let counterparty_address = shared_crypto::signer_address_of(&counterparty_identifier)
            .map_err(sl_01_channel_model::ChannelError::from)?;

        execution.awaiting_counterparty();
        let response = ctx
            .messaging
            .send_and_wait(
                ProtocolMessage {
                    process_id: execution.process_id(),
                    seq: 1,
                    from: me,
                    to: counterparty_identifier,
                    params: ProtocolParams::TakeAction(params.clone()),
                    signatures: vec![my_signature],
                    identity_hash: Some(params.identity_hash),
                },
                ctx.timeouts.round_timeout,
            )
            .await?;

        expect_seq(&response, 2)?;
        let their_signature = take_signature(&response, 0)?;
        assert_signed_by(
            &step.set_state.hash_to_sign(),
            &their_signature,
            counterparty_address,
        )?;

        step.set_state.add_signature(my_signature)?;
        step.set_state.add_signature(their_signature)?;

        persist(ctx, &step).await?;
        Ok(step.next_app.to_json())
    }
    .await;

    match result {
        Ok(app) => {
            execution.committed();
            Ok(app)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}

/// Responder half: recompute the identical transition, verify, sign,
/// persist, reply.
pub async fn respond(
    ctx: &ProtocolContext,
    message: ProtocolMessage,
) -> Result<AppInstanceJson, ProtocolError> {
    let ProtocolParams::TakeAction(params) = message.params.clone() else {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq: 1,
            actual_seq: message.seq,
        });
    };
    let mut execution = Execution::start(
        shared_types::ProtocolName::TakeAction,
        params.multisig_address,
        message.process_id,
    );

    let result = async {
        expect_seq(&message, 1)?;
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let mut step = build_action_step(ctx, &channel, &params).await?;

        let their_address = shared_crypto::signer_address_of(&message.from)
            .map_err(sl_01_channel_model::ChannelError::from)?;
        let their_signature = take_signature(&message, 0)?;
        assert_signed_by(&step.set_state.hash_to_sign(), &their_signature, their_address)?;

        let my_signature = ctx.signer.sign(&step.set_state.hash_to_sign()).await?;
        step.set_state.add_signature(their_signature)?;
        step.set_state.add_signature(my_signature)?;

        persist(ctx, &step).await?;

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
        Ok(step.next_app.to_json())
    }
    .await;

    match result {
        Ok(app) => {
            execution.committed();
            Ok(app)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}
