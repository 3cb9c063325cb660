//! # Install Protocol
//!
//! Promotes a proposal to an active, funded app. Both parties build the
//! app's conditional transaction commitment and the advanced free balance
//! attestation, exchange signatures on both digests, and then atomically
//! activate the app while debiting its funding from free balance.
//!
//! Insufficient free balance surfaces before any signature is produced
//! or sent.

use shared_types::{AppInstanceJson, InstallParams, ProtocolMessage, ProtocolParams, U256};
use sl_01_channel_model::StateChannel;
use sl_02_commitments::{assert_signed_by, ConditionalTransactionCommitment, SetStateCommitment};
use uuid::Uuid;

use super::common::{checkout_channel, expect_seq, free_balance_set_state, take_signature};
use super::context::{Execution, ProtocolContext};
use super::errors::ProtocolError;

struct InstallStep {
    next_channel: StateChannel,
    conditional: ConditionalTransactionCommitment,
    fb_set_state: SetStateCommitment,
    app_json: AppInstanceJson,
}

/// Derive the post-install aggregate and both commitments. Fails with
/// `InsufficientBalance` before anything is signed if the declared
/// deposits exceed free balance.
fn build_install_step(
    ctx: &ProtocolContext,
    channel: &StateChannel,
    params: &InstallParams,
) -> Result<InstallStep, ProtocolError> {
    let proposal = channel.get_proposal(&params.identity_hash)?.clone();
    let decrements = proposal.funding_decrements();

    let next_channel =
        channel.add_active_app_and_increment_free_balance(&params.identity_hash, &decrements)?;

    let conditional = ConditionalTransactionCommitment::new(
        &ctx.network,
        channel.multisig_address(),
        &channel.multisig_owners(),
        proposal.identity_hash(),
        channel.free_balance_app_instance().identity_hash(),
        proposal.interpreter_params().clone(),
    )?;
    let fb_set_state = free_balance_set_state(ctx, &next_channel)?;

    Ok(InstallStep {
        next_channel,
        conditional,
        fb_set_state,
        app_json: proposal.to_json(),
    })
}

/// Sanity bound: the multisig must actually hold each deposit token in
/// at least the amount this install locks up.
async fn validate_multisig_holdings(
    ctx: &ProtocolContext,
    channel: &StateChannel,
    app: &AppInstanceJson,
) -> Result<(), ProtocolError> {
    for (token_address, required) in [
        (app.initiator_deposit_token_address, app.initiator_deposit),
        (app.responder_deposit_token_address, app.responder_deposit),
    ] {
        if required == U256::zero() {
            continue;
        }
        let available = ctx
            .chain
            .multisig_balance(channel.multisig_address(), token_address)
            .await?;
        if available < required {
            return Err(ProtocolError::InsufficientMultisigBalance {
                multisig_address: channel.multisig_address(),
                token_address,
                required,
                available,
            });
        }
    }
    Ok(())
}

async fn persist(
    ctx: &ProtocolContext,
    step: &InstallStep,
) -> Result<(), ProtocolError> {
    ctx.store
        .create_app_instance(
            &step.next_channel.to_json(),
            &step.app_json,
            &step.fb_set_state.to_json(),
            &step.conditional.to_json(),
        )
        .await?;
    Ok(())
}

/// Initiator half.
pub async fn initiate(
    ctx: &ProtocolContext,
    params: InstallParams,
) -> Result<AppInstanceJson, ProtocolError> {
    let mut execution = Execution::start(
        shared_types::ProtocolName::Install,
        params.multisig_address,
        Uuid::new_v4(),
    );

    let result = async {
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let mut step = build_install_step(ctx, &channel, &params)?;
        validate_multisig_holdings(ctx, &channel, &step.app_json).await?;

        let my_conditional_signature = ctx.signer.sign(&step.conditional.hash_to_sign()).await?;
        let my_fb_signature = ctx.signer.sign(&step.fb_set_state.hash_to_sign()).await?;

        let [initiator_identifier, responder_identifier] = channel.user_identifiers();
        let me = ctx.signer.public_identifier();
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
                    params: ProtocolParams::Install(params),
                    signatures: vec![my_conditional_signature, my_fb_signature],
                    identity_hash: Some(params.identity_hash),
                },
                ctx.timeouts.round_timeout,
            )
            .await?;

        expect_seq(&response, 2)?;
        let their_conditional_signature = take_signature(&response, 0)?;
        let their_fb_signature = take_signature(&response, 1)?;
        assert_signed_by(
            &step.conditional.hash_to_sign(),
            &their_conditional_signature,
            counterparty_address,
        )?;
        assert_signed_by(
            &step.fb_set_state.hash_to_sign(),
            &their_fb_signature,
            counterparty_address,
        )?;

        step.conditional.add_signature(my_conditional_signature)?;
        step.conditional.add_signature(their_conditional_signature)?;
        step.fb_set_state.add_signature(my_fb_signature)?;
        step.fb_set_state.add_signature(their_fb_signature)?;

        persist(ctx, &step).await?;
        Ok(step.app_json.clone())
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

/// Responder half: rebuild the identical step from its own persisted
/// proposal, verify, countersign, persist, reply.
pub async fn respond(
    ctx: &ProtocolContext,
    message: ProtocolMessage,
) -> Result<AppInstanceJson, ProtocolError> {
    let ProtocolParams::Install(params) = message.params.clone() else {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq: 1,
            actual_seq: message.seq,
        });
    };
    let mut execution = Execution::start(
        shared_types::ProtocolName::Install,
        params.multisig_address,
        message.process_id,
    );

    let result = async {
        expect_seq(&message, 1)?;
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let mut step = build_install_step(ctx, &channel, &params)?;
        validate_multisig_holdings(ctx, &channel, &step.app_json).await?;

        let me = ctx.signer.public_identifier();
        let their_address = shared_crypto::signer_address_of(&message.from)
            .map_err(sl_01_channel_model::ChannelError::from)?;

        let their_conditional_signature = take_signature(&message, 0)?;
        let their_fb_signature = take_signature(&message, 1)?;
        assert_signed_by(
            &step.conditional.hash_to_sign(),
            &their_conditional_signature,
            their_address,
        )?;
        assert_signed_by(
            &step.fb_set_state.hash_to_sign(),
            &their_fb_signature,
            their_address,
        )?;

        let my_conditional_signature = ctx.signer.sign(&step.conditional.hash_to_sign()).await?;
        let my_fb_signature = ctx.signer.sign(&step.fb_set_state.hash_to_sign()).await?;

        step.conditional.add_signature(their_conditional_signature)?;
        step.conditional.add_signature(my_conditional_signature)?;
        step.fb_set_state.add_signature(their_fb_signature)?;
        step.fb_set_state.add_signature(my_fb_signature)?;

        persist(ctx, &step).await?;

        ctx.messaging
            .send(ProtocolMessage {
                process_id: message.process_id,
                seq: 2,
                from: me,
                to: message.from,
                params: message.params.clone(),
                signatures: vec![my_conditional_signature, my_fb_signature],
                identity_hash: Some(params.identity_hash),
            })
            .await?;
        Ok(step.app_json.clone())
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
