//! # Sync Protocol
//!
//! Desynchronization recovery: one party sends its full persisted channel
//! snapshot (with the commitments backing it); the receiver diffs
//! proposal counters and version numbers against its own and adopts the
//! counterparty's state only if the counterparty is ahead on every
//! dimension, after re-verifying every included signature.
//!
//! Mixed divergence (ahead on one dimension, behind on another) and equal
//! counters with differing content are `ChannelDesynchronized` — reported
//! for manual intervention, never merged by guesswork.

use shared_types::{
    Address, ProtocolMessage, ProtocolParams, StateChannelJson, SyncParams, SyncSnapshot,
};
use sl_01_channel_model::StateChannel;
use sl_02_commitments::{ConditionalTransactionCommitment, SetStateCommitment};
use std::cmp::Ordering;
use tracing::{debug, info};
use uuid::Uuid;

use super::context::{Execution, ProtocolContext};
use super::errors::ProtocolError;

/// How two snapshots relate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    /// Snapshots are byte-equal; nothing to do.
    Identical,
    /// The counterparty is ahead on every divergent dimension; adopt.
    AdoptTheirs,
    /// We are ahead on every divergent dimension; offer ours.
    KeepMine,
    /// Conflicting histories; manual intervention required.
    Desynchronized(String),
}

fn fold_ordering(acc: Option<Ordering>, next: Ordering) -> Result<Option<Ordering>, String> {
    match (acc, next) {
        (_, Ordering::Equal) => Ok(acc),
        (None | Some(Ordering::Less), Ordering::Less) => Ok(Some(Ordering::Less)),
        (None | Some(Ordering::Greater), Ordering::Greater) => Ok(Some(Ordering::Greater)),
        (Some(Ordering::Less), Ordering::Greater) | (Some(Ordering::Greater), Ordering::Less) => {
            Err("mixed divergence across counters".to_string())
        }
        (Some(Ordering::Equal), _) => unreachable!("Equal is never accumulated"),
    }
}

/// Compare two snapshots of the same channel.
///
/// Dimensions: the monotonic proposal counter, the free balance version,
/// and each shared app's version number. `Less` means "mine is behind".
#[must_use]
pub fn sync_decision(mine: &StateChannelJson, theirs: &StateChannelJson) -> SyncDecision {
    let mut acc: Option<Ordering> = None;

    let dimensions = [
        mine.monotonic_num_proposed_apps
            .cmp(&theirs.monotonic_num_proposed_apps),
        mine.free_balance_app_instance
            .latest_version_number
            .cmp(&theirs.free_balance_app_instance.latest_version_number),
    ];
    for ordering in dimensions {
        match fold_ordering(acc, ordering) {
            Ok(next) => acc = next,
            Err(detail) => return SyncDecision::Desynchronized(detail),
        }
    }

    for (identity_hash, mine_app) in &mine.app_instances {
        if let Some(theirs_app) = theirs.app_instances.get(identity_hash) {
            let ordering = mine_app
                .latest_version_number
                .cmp(&theirs_app.latest_version_number);
            match fold_ordering(acc, ordering) {
                Ok(next) => acc = next,
                Err(detail) => return SyncDecision::Desynchronized(detail),
            }
        }
    }

    match acc {
        Some(Ordering::Less) => SyncDecision::AdoptTheirs,
        Some(Ordering::Greater) => SyncDecision::KeepMine,
        None | Some(Ordering::Equal) => {
            if mine == theirs {
                SyncDecision::Identical
            } else {
                SyncDecision::Desynchronized(
                    "equal counters with differing content".to_string(),
                )
            }
        }
    }
}

/// Assemble this node's snapshot from the store.
pub async fn build_snapshot(
    ctx: &ProtocolContext,
    multisig_address: Address,
) -> Result<Option<SyncSnapshot>, ProtocolError> {
    let Some(channel) = ctx.store.get_state_channel(multisig_address).await? else {
        return Ok(None);
    };
    let free_balance_set_state = ctx.store.get_free_balance_set_state(multisig_address).await?;
    let set_state_commitments = ctx.store.get_set_state_commitments(multisig_address).await?;
    let conditional_commitments = ctx
        .store
        .get_conditional_commitments(multisig_address)
        .await?;
    Ok(Some(SyncSnapshot {
        channel,
        free_balance_set_state,
        set_state_commitments,
        conditional_commitments,
    }))
}

/// Re-verify everything in a counterparty snapshot, then persist it
/// wholesale. Nothing in the snapshot is trusted before this point.
pub async fn verify_and_adopt(
    ctx: &ProtocolContext,
    snapshot: &SyncSnapshot,
) -> Result<StateChannelJson, ProtocolError> {
    let multisig_address = snapshot.channel.multisig_address;
    // Structural validation and signer re-derivation.
    let channel = StateChannel::from_json(snapshot.channel.clone())?;

    // Free balance attestation must match the snapshot's free balance app.
    let fb_app = channel.free_balance_app_instance();
    let fb_commitment = SetStateCommitment::from_json(snapshot.free_balance_set_state.clone())?;
    if fb_commitment.app_identity_hash() != fb_app.identity_hash()
        || fb_commitment.version_number() != fb_app.latest_version_number()
        || fb_commitment.app_state_hash() != fb_app.state_hash()
    {
        return Err(ProtocolError::ChannelDesynchronized {
            multisig_address,
            detail: "free balance attestation does not match snapshot".into(),
        });
    }
    fb_commitment.verify_signatures()?;

    // Every app (active or proposed) needs a verifiable attestation of
    // its latest state.
    for (identity_hash, app) in channel
        .app_instances()
        .iter()
        .chain(channel.proposed_app_instances().iter())
    {
        let commitment_json = snapshot
            .set_state_commitments
            .iter()
            .find(|c| c.app_identity_hash == *identity_hash)
            .ok_or_else(|| ProtocolError::ChannelDesynchronized {
                multisig_address,
                detail: format!("missing set-state attestation for app {identity_hash}"),
            })?;
        let commitment = SetStateCommitment::from_json(commitment_json.clone())?;
        if commitment.version_number() != app.latest_version_number()
            || commitment.app_state_hash() != app.state_hash()
        {
            return Err(ProtocolError::ChannelDesynchronized {
                multisig_address,
                detail: format!("stale set-state attestation for app {identity_hash}"),
            });
        }
        commitment.verify_signatures()?;
    }

    // Active apps additionally need their conditional payout commitment.
    for identity_hash in channel.app_instances().keys() {
        let commitment_json = snapshot
            .conditional_commitments
            .iter()
            .find(|c| c.app_identity_hash == *identity_hash)
            .ok_or_else(|| ProtocolError::ChannelDesynchronized {
                multisig_address,
                detail: format!("missing conditional commitment for app {identity_hash}"),
            })?;
        let commitment =
            ConditionalTransactionCommitment::from_json(&ctx.network, commitment_json.clone())?;
        commitment.verify_signatures()?;
    }

    ctx.store
        .save_synced_channel(
            &snapshot.channel,
            &snapshot.free_balance_set_state,
            &snapshot.set_state_commitments,
            &snapshot.conditional_commitments,
        )
        .await?;
    info!(%multisig_address, "Adopted counterparty channel snapshot");
    Ok(snapshot.channel.clone())
}

/// Initiator half: offer my snapshot; adopt the reply if it is ahead.
pub async fn initiate(
    ctx: &ProtocolContext,
    params: SyncParams,
) -> Result<StateChannelJson, ProtocolError> {
    let mut execution = Execution::start(
        shared_types::ProtocolName::Sync,
        params.multisig_address,
        Uuid::new_v4(),
    );

    let result = async {
        // The initiator must hold some committed state; a node that lost
        // everything is recovered by the counterparty initiating sync
        // toward it instead.
        let my_snapshot =
            build_snapshot(ctx, params.multisig_address)
                .await?
                .ok_or(ProtocolError::ChannelNotFound {
                    multisig_address: params.multisig_address,
                })?;
        let channel = StateChannel::from_json(my_snapshot.channel.clone())?;

        let me = ctx.signer.public_identifier();
        let [initiator_identifier, responder_identifier] = channel.user_identifiers();
        let counterparty_identifier = if me == initiator_identifier {
            responder_identifier
        } else {
            initiator_identifier
        };

        execution.awaiting_counterparty();
        let response = ctx
            .messaging
            .send_and_wait(
                ProtocolMessage {
                    process_id: execution.process_id(),
                    seq: 1,
                    from: me,
                    to: counterparty_identifier,
                    params: ProtocolParams::Sync(SyncParams {
                        multisig_address: params.multisig_address,
                        snapshot: Some(Box::new(my_snapshot.clone())),
                    }),
                    signatures: vec![],
                    identity_hash: None,
                },
                ctx.timeouts.round_timeout,
            )
            .await?;

        let ProtocolParams::Sync(reply) = response.params else {
            return Err(ProtocolError::UnexpectedMessage {
                protocol: shared_types::ProtocolName::Sync,
                expected_seq: 2,
                actual_seq: response.seq,
            });
        };

        match reply.snapshot {
            // Counterparty was behind or equal; my state stands.
            None => Ok(my_snapshot.channel),
            // Counterparty offered its state; adopt only if it is ahead.
            Some(theirs) if theirs.channel.multisig_address != params.multisig_address => {
                Err(ProtocolError::ChannelDesynchronized {
                    multisig_address: params.multisig_address,
                    detail: format!("snapshot is for channel {}", theirs.channel.multisig_address),
                })
            }
            Some(theirs) => match sync_decision(&my_snapshot.channel, &theirs.channel) {
                SyncDecision::AdoptTheirs => verify_and_adopt(ctx, &theirs).await,
                SyncDecision::Identical => Ok(my_snapshot.channel),
                SyncDecision::KeepMine => Err(ProtocolError::ChannelDesynchronized {
                    multisig_address: params.multisig_address,
                    detail: "counterparty offered a snapshot that is behind ours".into(),
                }),
                SyncDecision::Desynchronized(detail) => {
                    Err(ProtocolError::ChannelDesynchronized {
                        multisig_address: params.multisig_address,
                        detail,
                    })
                }
            },
        }
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

/// Responder half outcome, so the caller can emit the right notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResponse {
    /// Adopted the initiator's snapshot.
    Adopted(StateChannelJson),
    /// Replied with our own (ahead or equal) snapshot.
    OfferedOurs(StateChannelJson),
    /// Snapshots were identical.
    AlreadyInSync(StateChannelJson),
}

/// Responder half.
pub async fn respond(
    ctx: &ProtocolContext,
    message: ProtocolMessage,
) -> Result<SyncResponse, ProtocolError> {
    let ProtocolParams::Sync(params) = message.params.clone() else {
        return Err(ProtocolError::UnexpectedMessage {
            protocol: message.protocol(),
            expected_seq: 1,
            actual_seq: message.seq,
        });
    };
    let SyncParams {
        multisig_address,
        snapshot: their_snapshot,
    } = params;
    let mut execution = Execution::start(
        shared_types::ProtocolName::Sync,
        multisig_address,
        message.process_id,
    );

    let reply = |snapshot: Option<Box<SyncSnapshot>>| ProtocolMessage {
        process_id: message.process_id,
        seq: 2,
        from: ctx.signer.public_identifier(),
        to: message.from,
        params: ProtocolParams::Sync(SyncParams {
            multisig_address,
            snapshot,
        }),
        signatures: vec![],
        identity_hash: None,
    };

    let result = async {
        if let Some(theirs) = &their_snapshot {
            if theirs.channel.multisig_address != multisig_address {
                return Err(ProtocolError::ChannelDesynchronized {
                    multisig_address,
                    detail: format!(
                        "snapshot is for channel {}",
                        theirs.channel.multisig_address
                    ),
                });
            }
        }
        let mine = build_snapshot(ctx, multisig_address).await?;

        match (mine, their_snapshot) {
            (None, Some(theirs)) => {
                debug!(
                    %multisig_address,
                    "No local channel; adopting counterparty snapshot"
                );
                let channel = verify_and_adopt(ctx, &theirs).await?;
                ctx.messaging.send(reply(None)).await?;
                Ok(SyncResponse::Adopted(channel))
            }
            (Some(mine), None) => {
                ctx.messaging.send(reply(Some(Box::new(mine.clone())))).await?;
                Ok(SyncResponse::OfferedOurs(mine.channel))
            }
            (Some(mine), Some(theirs)) => match sync_decision(&mine.channel, &theirs.channel) {
                SyncDecision::Identical => {
                    ctx.messaging.send(reply(None)).await?;
                    Ok(SyncResponse::AlreadyInSync(mine.channel))
                }
                SyncDecision::AdoptTheirs => {
                    let channel = verify_and_adopt(ctx, &theirs).await?;
                    ctx.messaging.send(reply(None)).await?;
                    Ok(SyncResponse::Adopted(channel))
                }
                SyncDecision::KeepMine => {
                    ctx.messaging.send(reply(Some(Box::new(mine.clone())))).await?;
                    Ok(SyncResponse::OfferedOurs(mine.channel))
                }
                SyncDecision::Desynchronized(detail) => {
                    Err(ProtocolError::ChannelDesynchronized {
                        multisig_address,
                        detail,
                    })
                }
            },
            (None, None) => Err(ProtocolError::ChannelNotFound { multisig_address }),
        }
    }
    .await;

    match result {
        Ok(outcome) => {
            execution.committed();
            Ok(outcome)
        }
        Err(err) => {
            execution.aborted(&err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_json(num_proposed: u64, fb_version: u64) -> StateChannelJson {
        use shared_types::*;
        let app = AppInstanceJson {
            identity_hash: Bytes32([0x01; 32]),
            multisig_address: Address([0x44; 20]),
            initiator_identifier: PublicIdentifier([0x03; 33]),
            responder_identifier: PublicIdentifier([0x04; 33]),
            default_timeout: U256::from(600u64),
            app_interface: AppInterface {
                addr: Address([0x05; 20]),
                state_encoding: "tuple(uint256 c)".into(),
                action_encoding: None,
            },
            app_seq_no: 0,
            initiator_deposit: U256::zero(),
            initiator_deposit_token_address: Address::zero(),
            responder_deposit: U256::zero(),
            responder_deposit_token_address: Address::zero(),
            latest_state: serde_json::json!({}),
            latest_version_number: fb_version,
            state_timeout: U256::zero(),
            outcome_type: OutcomeType::MultiAssetMultiPartyCoinTransfer,
            interpreter_params: InterpreterParams::MultiAssetMultiPartyCoinTransfer {
                limit: vec![],
                token_addresses: vec![],
            },
            meta: None,
            latest_action: None,
        };
        StateChannelJson {
            schema_version: 1,
            multisig_address: Address([0x44; 20]),
            addresses: ChannelAddresses {
                proxy_factory: Address([0x21; 20]),
                multisig_mastercopy: Address([0x22; 20]),
            },
            user_identifiers: vec![PublicIdentifier([0x03; 33]), PublicIdentifier([0x04; 33])],
            free_balance_app_instance: app,
            app_instances: Default::default(),
            proposed_app_instances: Default::default(),
            monotonic_num_proposed_apps: num_proposed,
        }
    }

    #[test]
    fn test_identical_snapshots() {
        let a = channel_json(2, 3);
        assert_eq!(sync_decision(&a, &a.clone()), SyncDecision::Identical);
    }

    #[test]
    fn test_adopt_when_behind_on_proposals() {
        let mine = channel_json(1, 3);
        let theirs = channel_json(2, 3);
        assert_eq!(sync_decision(&mine, &theirs), SyncDecision::AdoptTheirs);
        assert_eq!(sync_decision(&theirs, &mine), SyncDecision::KeepMine);
    }

    #[test]
    fn test_adopt_when_behind_on_free_balance() {
        let mine = channel_json(2, 3);
        let theirs = channel_json(2, 5);
        assert_eq!(sync_decision(&mine, &theirs), SyncDecision::AdoptTheirs);
    }

    #[test]
    fn test_mixed_divergence_is_desynchronized() {
        // Ahead on proposals, behind on free balance version.
        let mine = channel_json(3, 2);
        let theirs = channel_json(2, 4);
        assert!(matches!(
            sync_decision(&mine, &theirs),
            SyncDecision::Desynchronized(_)
        ));
    }

    #[test]
    fn test_equal_counters_different_content_is_desynchronized() {
        let mine = channel_json(2, 3);
        let mut theirs = channel_json(2, 3);
        theirs.free_balance_app_instance.latest_state = serde_json::json!({ "x": 1 });
        assert!(matches!(
            sync_decision(&mine, &theirs),
            SyncDecision::Desynchronized(_)
        ));
    }
}
