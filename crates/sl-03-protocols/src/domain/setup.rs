//! # Setup Protocol
//!
//! Establishes a channel: both parties derive the identical initial
//! aggregate (zero-funded free balance, no apps), sign the setup
//! commitment and the free balance's version-0 attestation, and persist
//! atomically. Single round, no deposits involved.

use shared_types::{ProtocolMessage, ProtocolParams, SetupParams, StateChannelJson};
use sl_01_channel_model::StateChannel;
use sl_02_commitments::{assert_signed_by, SetupCommitment};
use uuid::Uuid;

use crate::ports::StateChannelStore;

use super::common::{expect_seq, free_balance_set_state, take_signature};
use super::context::{Execution, ProtocolContext};
use super::errors::ProtocolError;

/// Build the deterministic initial aggregate and its two commitments.
fn build_setup_state(
    ctx: &ProtocolContext,
    params: &SetupParams,
) -> Result<(StateChannel, SetupCommitment), ProtocolError> {
    let channel = StateChannel::setup_channel(
        ctx.network.identity_app,
        params.addresses,
        params.multisig_address,
        params.initiator_identifier,
        params.responder_identifier,
    )?;
    let setup_commitment = SetupCommitment::new(
        &ctx.network,
        params.multisig_address,
        &channel.multisig_owners(),
        channel.free_balance_app_instance().identity_hash(),
    )?;
    Ok((channel, setup_commitment))
}

async fn persist(
    store: &dyn StateChannelStore,
    channel: &StateChannel,
    setup_commitment: &SetupCommitment,
    free_balance_set_state: &sl_02_commitments::SetStateCommitment,
) -> Result<(), ProtocolError> {
    store
        .create_state_channel(
            &channel.to_json(),
            &setup_commitment.signed_transaction()?,
            &free_balance_set_state.to_json(),
        )
        .await?;
    Ok(())
}

/// Initiator half: sign, exchange, verify, persist.
pub async fn initiate(
    ctx: &ProtocolContext,
    params: SetupParams,
) -> Result<StateChannelJson, ProtocolError> {
    let mut execution = Execution::start(
        shared_types::ProtocolName::Setup,
        params.multisig_address,
        Uuid::new_v4(),
    );

    if ctx
        .store
        .get_state_channel(params.multisig_address)
        .await?
        .is_some()
    {
        let err = ProtocolError::ChannelAlreadyExists {
            multisig_address: params.multisig_address,
        };
        execution.aborted(&err);
        return Err(err);
    }

    let (channel, mut setup_commitment) = build_setup_state(ctx, &params)?;
    let mut fb_set_state = free_balance_set_state(ctx, &channel)?;

    let my_setup_signature = ctx.signer.sign(&setup_commitment.hash_to_sign()).await?;
    let my_fb_signature = ctx.signer.sign(&fb_set_state.hash_to_sign()).await?;

    execution.awaiting_counterparty();
    let response = ctx
        .messaging
        .send_and_wait(
            ProtocolMessage {
                process_id: execution.process_id(),
                seq: 1,
                from: params.initiator_identifier,
                to: params.responder_identifier,
                params: ProtocolParams::Setup(params.clone()),
                signatures: vec![my_setup_signature, my_fb_signature],
                identity_hash: None,
            },
            ctx.timeouts.round_timeout,
        )
        .await
        .map_err(|err| {
            let err = ProtocolError::from(err);
            execution.aborted(&err);
            err
        })?;

    let result = async {
        expect_seq(&response, 2)?;
        let counterparty = channel.multisig_owners()[1];
        let their_setup_signature = take_signature(&response, 0)?;
        let their_fb_signature = take_signature(&response, 1)?;
        assert_signed_by(
            &setup_commitment.hash_to_sign(),
            &their_setup_signature,
            counterparty,
        )?;
        assert_signed_by(&fb_set_state.hash_to_sign(), &their_fb_signature, counterparty)?;

        setup_commitment.add_signature(my_setup_signature)?;
        setup_commitment.add_signature(their_setup_signature)?;
        fb_set_state.add_signature(my_fb_signature)?;
        fb_set_state.add_signature(their_fb_signature)?;

        persist(ctx.store.as_ref(), &channel, &setup_commitment, &fb_set_state).await
    }
    .await;

    match result {
        Ok(()) => {
            execution.committed();
            Ok(channel.to_json())
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}

/// Responder half: verify the initiator's signatures over the identical
/// derived state, countersign, persist, reply.
pub async fn respond(
    ctx: &ProtocolContext,
    message: ProtocolMessage,
) -> Result<StateChannelJson, ProtocolError> {
    let ProtocolParams::Setup(params) = message.params.clone() else {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq: 1,
            actual_seq: message.seq,
        });
    };
    let mut execution = Execution::start(
        shared_types::ProtocolName::Setup,
        params.multisig_address,
        message.process_id,
    );

    let result = async {
        expect_seq(&message, 1)?;
        if ctx
            .store
            .get_state_channel(params.multisig_address)
            .await?
            .is_some()
        {
            return Err(ProtocolError::ChannelAlreadyExists {
                multisig_address: params.multisig_address,
            });
        }

        let (channel, mut setup_commitment) = build_setup_state(ctx, &params)?;
        let mut fb_set_state = free_balance_set_state(ctx, &channel)?;

        let initiator = channel.multisig_owners()[0];
        let their_setup_signature = take_signature(&message, 0)?;
        let their_fb_signature = take_signature(&message, 1)?;
        assert_signed_by(
            &setup_commitment.hash_to_sign(),
            &their_setup_signature,
            initiator,
        )?;
        assert_signed_by(&fb_set_state.hash_to_sign(), &their_fb_signature, initiator)?;

        let my_setup_signature = ctx.signer.sign(&setup_commitment.hash_to_sign()).await?;
        let my_fb_signature = ctx.signer.sign(&fb_set_state.hash_to_sign()).await?;

        setup_commitment.add_signature(their_setup_signature)?;
        setup_commitment.add_signature(my_setup_signature)?;
        fb_set_state.add_signature(their_fb_signature)?;
        fb_set_state.add_signature(my_fb_signature)?;

        persist(ctx.store.as_ref(), &channel, &setup_commitment, &fb_set_state).await?;

        ctx.messaging
            .send(ProtocolMessage {
                process_id: message.process_id,
                seq: 2,
                from: params.responder_identifier,
                to: params.initiator_identifier,
                params: message.params.clone(),
                signatures: vec![my_setup_signature, my_fb_signature],
                identity_hash: None,
            })
            .await?;
        Ok(channel.to_json())
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
