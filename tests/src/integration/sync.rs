//! Sync protocol scenarios: a replica that missed committed messages
//! converges onto the counterparty's (ahead) snapshot, in either
//! direction, with every signature re-verified before adoption.

use shared_bus::ChannelEvent;
use sl_03_protocols::ports::StateChannelStore;

use super::fixtures::{create_channel, transfer_proposal, two_nodes, MULTISIG, TOKEN};

/// Capture node `b`'s full store record, run `advance`, then restore the
/// captured record on `b` only — leaving `b` one committed step behind.
async fn diverge_b_behind(
    a: &super::fixtures::TestNode,
    b: &super::fixtures::TestNode,
) -> shared_types::Bytes32 {
    let old_channel = b.store.get_state_channel(MULTISIG).await.unwrap().unwrap();
    let old_fb = b.store.get_free_balance_set_state(MULTISIG).await.unwrap();
    let old_set_states = b.store.get_set_state_commitments(MULTISIG).await.unwrap();
    let old_conditionals = b.store.get_conditional_commitments(MULTISIG).await.unwrap();

    let proposal = a
        .engine
        .propose_install(transfer_proposal(&a, &b, 7, TOKEN))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Roll B back as if it crashed before persisting the proposal.
    b.store
        .save_synced_channel(&old_channel, &old_fb, &old_set_states, &old_conditionals)
        .await
        .unwrap();
    proposal.identity_hash
}

#[tokio::test]
async fn test_behind_replica_adopts_on_initiating_sync() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    let identity_hash = diverge_b_behind(&a, &b).await;

    let channel_b = b.channel().await;
    assert_eq!(channel_b.num_proposed_apps(), 0);

    // B initiates sync; A replies with its ahead snapshot; B adopts.
    let synced = b.engine.sync(MULTISIG).await.unwrap();
    assert_eq!(synced.monotonic_num_proposed_apps, 1);
    assert!(synced.proposed_app_instances.contains_key(&identity_hash));

    let channel_a = a.channel().await.to_json();
    let channel_b = b.channel().await.to_json();
    assert_eq!(channel_a, channel_b);
}

#[tokio::test]
async fn test_ahead_replica_pushes_on_initiating_sync() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    let identity_hash = diverge_b_behind(&a, &b).await;

    let mut events_b = b.engine.subscribe();

    // A initiates sync; B sees it is behind and adopts A's snapshot.
    let synced = a.engine.sync(MULTISIG).await.unwrap();
    assert!(synced.proposed_app_instances.contains_key(&identity_hash));

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), events_b.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        ChannelEvent::SyncReceived {
            multisig_address: MULTISIG
        }
    );

    let channel_a = a.channel().await.to_json();
    let channel_b = b.channel().await.to_json();
    assert_eq!(channel_a, channel_b);
}

#[tokio::test]
async fn test_sync_between_identical_replicas_is_a_noop() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let before_a = a.channel().await.to_json();
    let synced = a.engine.sync(MULTISIG).await.unwrap();

    assert_eq!(synced, before_a);
    assert_eq!(b.channel().await.to_json(), before_a);
}
