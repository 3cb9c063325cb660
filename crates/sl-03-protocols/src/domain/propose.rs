//! # Propose Protocol
//!
//! The initiator constructs an unfunded proposal app instance; both
//! parties validate it against their app registry and funding policy,
//! derive the identical instance independently, exchange signatures on
//! the attestation of its initial state, and persist it into
//! `proposed_app_instances`. Funding signatures happen at install. The
//! round-trip ack echoes the responder's derived identity hash so
//! divergent derivations surface immediately.

use shared_crypto::signer_address_of;
use shared_types::{
    AppInstanceJson, AppInterface, InterpreterParams, OutcomeType, ProposeParams,
    ProtocolMessage, ProtocolParams,
};
use sl_01_channel_model::{AppInstance, AppInstanceSeed, StateChannel};
use uuid::Uuid;

use sl_02_commitments::assert_signed_by;

use super::common::{app_set_state, checkout_channel, expect_seq, take_signature};
use super::context::{Execution, ProtocolContext};
use super::errors::ProtocolError;
use super::validation::common_app_proposal_validation;

/// Derive interpreter parameters from the proposal's outcome type and
/// deposits. Both parties must derive identical values.
pub fn interpreter_params_for_proposal(
    params: &ProposeParams,
) -> Result<InterpreterParams, ProtocolError> {
    let total = params.initiator_deposit + params.responder_deposit;
    match params.outcome_type {
        OutcomeType::TwoPartyFixedOutcome => Ok(InterpreterParams::TwoPartyFixedOutcome {
            player_addrs: vec![
                signer_address_of(&params.initiator_identifier)
                    .map_err(sl_01_channel_model::ChannelError::from)?,
                signer_address_of(&params.responder_identifier)
                    .map_err(sl_01_channel_model::ChannelError::from)?,
            ],
            amount: total,
        }),
        OutcomeType::SingleAssetTwoPartyCoinTransfer => {
            if !params.responder_deposit.is_zero()
                && params.responder_deposit_token_address
                    != params.initiator_deposit_token_address
            {
                return Err(ProtocolError::SingleAssetTokenMismatch {
                    initiator_token: params.initiator_deposit_token_address,
                    responder_token: params.responder_deposit_token_address,
                });
            }
            Ok(InterpreterParams::SingleAssetTwoPartyCoinTransfer {
                limit: total,
                token_address: params.initiator_deposit_token_address,
            })
        }
        OutcomeType::MultiAssetMultiPartyCoinTransfer => {
            Ok(InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                limit: vec![params.initiator_deposit, params.responder_deposit],
                token_addresses: vec![
                    params.initiator_deposit_token_address,
                    params.responder_deposit_token_address,
                ],
            })
        }
    }
}

/// Deterministically build the proposal instance both parties must agree
/// on.
fn build_proposal(
    params: &ProposeParams,
    app_seq_no: u64,
) -> Result<AppInstance, ProtocolError> {
    let interpreter_params = interpreter_params_for_proposal(params)?;
    Ok(AppInstance::new(AppInstanceSeed {
        multisig_address: params.multisig_address,
        initiator_identifier: params.initiator_identifier,
        responder_identifier: params.responder_identifier,
        default_timeout: params.default_timeout,
        app_interface: AppInterface {
            addr: params.app_definition,
            state_encoding: params.abi_encodings.state_encoding.clone(),
            action_encoding: params.abi_encodings.action_encoding.clone(),
        },
        app_seq_no,
        initiator_deposit: params.initiator_deposit,
        initiator_deposit_token_address: params.initiator_deposit_token_address,
        responder_deposit: params.responder_deposit,
        responder_deposit_token_address: params.responder_deposit_token_address,
        initial_state: params.initial_state.clone(),
        state_timeout: params.state_timeout,
        outcome_type: params.outcome_type,
        interpreter_params,
        meta: params.meta.clone(),
    })?)
}

/// Validate against this node's own registry and funding policy.
fn validate_against_registry(
    ctx: &ProtocolContext,
    params: &ProposeParams,
) -> Result<(), ProtocolError> {
    let registry_info = ctx.app_registry.get_app_info(params.app_definition).ok_or(
        ProtocolError::AppRegistryMismatch {
            app_definition: params.app_definition,
            detail: "app definition not present in registry".into(),
        },
    )?;
    common_app_proposal_validation(
        params,
        &registry_info,
        &ctx.app_registry.supported_token_addresses(),
    )
}

/// Initiator half.
pub async fn initiate(
    ctx: &ProtocolContext,
    params: ProposeParams,
) -> Result<AppInstanceJson, ProtocolError> {
    let mut execution = Execution::start(
        shared_types::ProtocolName::Propose,
        params.multisig_address,
        Uuid::new_v4(),
    );

    let result = async {
        validate_against_registry(ctx, &params)?;
        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let proposal = build_proposal(&params, channel.next_app_seq_no())?;
        let next_channel: StateChannel = channel.add_proposal(proposal.clone())?;

        let mut set_state = app_set_state(ctx, &proposal)?;
        let my_signature = ctx.signer.sign(&set_state.hash_to_sign()).await?;

        execution.awaiting_counterparty();
        let response = ctx
            .messaging
            .send_and_wait(
                ProtocolMessage {
                    process_id: execution.process_id(),
                    seq: 1,
                    from: params.initiator_identifier,
                    to: params.responder_identifier,
                    params: ProtocolParams::Propose(params.clone()),
                    signatures: vec![my_signature],
                    identity_hash: Some(proposal.identity_hash()),
                },
                ctx.timeouts.round_timeout,
            )
            .await?;

        expect_seq(&response, 2)?;
        if response.identity_hash != Some(proposal.identity_hash()) {
            return Err(ProtocolError::ChannelDesynchronized {
                multisig_address: params.multisig_address,
                detail: format!(
                    "counterparty derived proposal {:?}, expected {}",
                    response.identity_hash,
                    proposal.identity_hash()
                ),
            });
        }
        let their_signature = take_signature(&response, 0)?;
        let responder_address = shared_crypto::signer_address_of(&params.responder_identifier)
            .map_err(sl_01_channel_model::ChannelError::from)?;
        assert_signed_by(&set_state.hash_to_sign(), &their_signature, responder_address)?;

        set_state.add_signature(my_signature)?;
        set_state.add_signature(their_signature)?;

        ctx.store
            .create_app_proposal(&next_channel.to_json(), &proposal.to_json(), &set_state.to_json())
            .await?;
        Ok(proposal.to_json())
    }
    .await;

    match result {
        Ok(proposal) => {
            execution.committed();
            Ok(proposal)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}

/// Responder half: derive the identical proposal, verify the advertised
/// identity hash, persist, ack.
pub async fn respond(
    ctx: &ProtocolContext,
    message: ProtocolMessage,
) -> Result<AppInstanceJson, ProtocolError> {
    let ProtocolParams::Propose(params) = message.params.clone() else {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq: 1,
            actual_seq: message.seq,
        });
    };
    let mut execution = Execution::start(
        shared_types::ProtocolName::Propose,
        params.multisig_address,
        message.process_id,
    );

    let result = async {
        expect_seq(&message, 1)?;
        validate_against_registry(ctx, &params)?;

        let channel = checkout_channel(ctx, params.multisig_address).await?;
        let proposal = build_proposal(&params, channel.next_app_seq_no())?;

        if message.identity_hash != Some(proposal.identity_hash()) {
            return Err(ProtocolError::ChannelDesynchronized {
                multisig_address: params.multisig_address,
                detail: format!(
                    "initiator advertised proposal {:?}, derived {}",
                    message.identity_hash,
                    proposal.identity_hash()
                ),
            });
        }

        let mut set_state = app_set_state(ctx, &proposal)?;
        let their_signature = take_signature(&message, 0)?;
        let initiator_address = shared_crypto::signer_address_of(&params.initiator_identifier)
            .map_err(sl_01_channel_model::ChannelError::from)?;
        assert_signed_by(&set_state.hash_to_sign(), &their_signature, initiator_address)?;

        let my_signature = ctx.signer.sign(&set_state.hash_to_sign()).await?;
        set_state.add_signature(their_signature)?;
        set_state.add_signature(my_signature)?;

        let next_channel = channel.add_proposal(proposal.clone())?;
        ctx.store
            .create_app_proposal(&next_channel.to_json(), &proposal.to_json(), &set_state.to_json())
            .await?;

        ctx.messaging
            .send(ProtocolMessage {
                process_id: message.process_id,
                seq: 2,
                from: params.responder_identifier,
                to: params.initiator_identifier,
                params: message.params.clone(),
                signatures: vec![my_signature],
                identity_hash: Some(proposal.identity_hash()),
            })
            .await?;
        Ok(proposal.to_json())
    }
    .await;

    match result {
        Ok(proposal) => {
            execution.committed();
            Ok(proposal)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}
