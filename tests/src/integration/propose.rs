//! Propose protocol scenarios: counterparty validation, persistence on
//! both nodes, rejection semantics, and the monotonic proposal counter.

use shared_bus::ChannelEvent;
use shared_types::{Address, U256};
use sl_03_protocols::ProtocolError;

use super::fixtures::{create_channel, transfer_proposal, two_nodes, MULTISIG, TOKEN};

#[tokio::test]
async fn test_propose_persists_on_both_nodes() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let mut events_b = b.engine.subscribe();

    let proposal = a
        .engine
        .propose_install(transfer_proposal(&a, &b, 7, TOKEN))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let channel_a = a.channel().await;
    let channel_b = b.channel().await;

    assert_eq!(channel_a.num_proposed_apps(), 1);
    assert_eq!(channel_a.monotonic_num_proposed_apps(), 1);
    assert!(channel_a.get_proposal(&proposal.identity_hash).is_ok());
    assert_eq!(channel_a.to_json(), channel_b.to_json());
    assert_eq!(proposal.app_seq_no, 1);

    // The responder surfaced the proposal as an out-of-band event.
    let event = tokio::time::timeout(std::time::Duration::from_secs(1), events_b.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        ChannelEvent::ProposeReceived {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        }
    );
}

#[tokio::test]
async fn test_propose_then_reject_keeps_monotonic_counter() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let proposal = a
        .engine
        .propose_install(transfer_proposal(&a, &b, 7, TOKEN))
        .await
        .unwrap();
    let after_propose = a.channel().await;
    assert_eq!(after_propose.monotonic_num_proposed_apps(), 1);

    let rejected = a
        .engine
        .reject_proposal(MULTISIG, proposal.identity_hash)
        .await
        .unwrap();

    // Back to empty, but the counter only ever increases.
    assert!(rejected.proposed_app_instances.is_empty());
    assert_eq!(rejected.monotonic_num_proposed_apps, 1);
}

#[tokio::test]
async fn test_reject_unknown_proposal_fails() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let err = a
        .engine
        .reject_proposal(MULTISIG, shared_types::Bytes32([0xEE; 32]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Channel(sl_01_channel_model::ChannelError::ProposalNotFound { .. })
    ));
}

#[tokio::test]
async fn test_propose_unsupported_token_rejected_before_messaging() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let mut params = transfer_proposal(&a, &b, 7, TOKEN);
    params.initiator_deposit_token_address = Address([0xEE; 20]);

    let err = a.engine.propose_install(params).await.unwrap_err();
    assert!(matches!(err.source, ProtocolError::UnsupportedToken { .. }));

    // Nothing was persisted on either node.
    let channel_a = a.channel().await;
    let channel_b = b.channel().await;
    assert_eq!(channel_a.num_proposed_apps(), 0);
    assert_eq!(channel_a.monotonic_num_proposed_apps(), 0);
    assert_eq!(channel_b.num_proposed_apps(), 0);
}

#[tokio::test]
async fn test_propose_zero_deposits_rejected() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let mut params = transfer_proposal(&a, &b, 0, TOKEN);
    params.initiator_deposit = U256::zero();
    params.responder_deposit = U256::zero();

    let err = a.engine.propose_install(params).await.unwrap_err();
    assert!(matches!(err.source, ProtocolError::ZeroDeposits));
}
