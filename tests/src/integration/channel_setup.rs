//! Setup protocol scenarios: both nodes derive and persist the identical
//! initial channel.

use super::fixtures::{create_channel, two_nodes, MULTISIG};
use sl_03_protocols::ProtocolError;
use sl_03_protocols::ports::StateChannelStore;

#[tokio::test]
async fn test_setup_creates_channel_on_both_nodes() {
    let (_bus, a, b) = two_nodes();
    let multisig = create_channel(&a, &b).await;
    assert_eq!(multisig, MULTISIG);

    // Responder persistence can land just after the initiator's return.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let channel_a = a.channel().await;
    let channel_b = b.channel().await;

    assert_eq!(channel_a.multisig_address(), MULTISIG);
    assert_eq!(channel_a.num_active_apps(), 0);
    assert_eq!(channel_a.num_proposed_apps(), 0);
    assert_eq!(channel_a.monotonic_num_proposed_apps(), 0);
    assert_eq!(channel_a.multisig_owners(), [a.address, b.address]);
    assert_eq!(channel_a.to_json(), channel_b.to_json());
}

#[tokio::test]
async fn test_setup_stores_signed_setup_transaction() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let setup_tx = a
        .store
        .get_setup_transaction(MULTISIG)
        .await
        .unwrap()
        .expect("setup transaction persisted");
    // execTransaction against the multisig itself.
    assert_eq!(setup_tx.to, MULTISIG);
    assert!(!setup_tx.data.is_empty());
}

#[tokio::test]
async fn test_setup_twice_is_rejected() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let err = a
        .engine
        .setup(shared_types::SetupParams {
            multisig_address: MULTISIG,
            initiator_identifier: a.identifier,
            responder_identifier: b.identifier,
            addresses: super::fixtures::network_context().channel_addresses(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err.source,
        ProtocolError::ChannelAlreadyExists { .. }
    ));
}
