//! Install, take-action, and uninstall scenarios, including the funding
//! arithmetic: the app initiator here is the channel's *second* multisig
//! owner, so its token balance is the one that moves.

use shared_types::{Address, InstallParams, TakeActionParams, UninstallParams, U256};
use sl_01_channel_model::ChannelError;
use sl_03_protocols::ProtocolError;

use super::fixtures::{
    create_channel, fund_channel, transfer_proposal, two_nodes, MULTISIG, TOKEN,
};

const FUNDING: u64 = 15;

#[tokio::test]
async fn test_install_debits_app_initiator_only() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    fund_channel(&a, &b, FUNDING).await;

    // App initiator is node B, the channel's second multisig owner,
    // depositing 7 on the token; responder deposits nothing.
    let proposal = b
        .engine
        .propose_install(transfer_proposal(&b, &a, 7, TOKEN))
        .await
        .unwrap();
    b.engine
        .install(InstallParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        })
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    for node in [&a, &b] {
        let channel = node.channel().await;
        let balances = channel.free_balance().unwrap().to_token_indexed_map();

        // B's token balance dropped by 7; everything else is untouched.
        assert_eq!(balances[&TOKEN][&b.address], U256::from(FUNDING - 7));
        assert_eq!(balances[&TOKEN][&a.address], U256::from(FUNDING));
        assert_eq!(balances[&Address::zero()][&a.address], U256::from(FUNDING));
        assert_eq!(balances[&Address::zero()][&b.address], U256::from(FUNDING));

        assert_eq!(channel.num_active_apps(), 1);
        assert_eq!(channel.num_proposed_apps(), 0);
    }
}

#[tokio::test]
async fn test_install_insufficient_free_balance_fails_cleanly() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    fund_channel(&a, &b, 5).await;

    let proposal = b
        .engine
        .propose_install(transfer_proposal(&b, &a, 9, TOKEN))
        .await
        .unwrap();
    let err = b
        .engine
        .install(InstallParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        ProtocolError::Channel(ChannelError::InsufficientBalance { .. })
    ));

    // The proposal is still pending and no balance moved.
    let channel = b.channel().await;
    assert_eq!(channel.num_proposed_apps(), 1);
    assert_eq!(channel.num_active_apps(), 0);
    assert_eq!(
        channel.free_balance().unwrap().get_balance(&TOKEN, &b.address),
        U256::from(5u64)
    );
}

#[tokio::test]
async fn test_install_then_uninstall_restores_free_balance() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    fund_channel(&a, &b, FUNDING).await;
    let before = a.channel().await.free_balance().unwrap().to_token_indexed_map();

    let proposal = b
        .engine
        .propose_install(transfer_proposal(&b, &a, 7, TOKEN))
        .await
        .unwrap();
    b.engine
        .install(InstallParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        })
        .await
        .unwrap();
    b.engine
        .uninstall(UninstallParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        })
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    for node in [&a, &b] {
        let channel = node.channel().await;
        assert_eq!(channel.num_active_apps(), 0);
        assert_eq!(
            channel.free_balance().unwrap().to_token_indexed_map(),
            before
        );
    }
}

#[tokio::test]
async fn test_take_action_moves_value_and_uninstall_pays_out() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;
    fund_channel(&a, &b, FUNDING).await;

    let proposal = b
        .engine
        .propose_install(transfer_proposal(&b, &a, 7, TOKEN))
        .await
        .unwrap();
    b.engine
        .install(InstallParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        })
        .await
        .unwrap();

    let advanced = b
        .engine
        .take_action(TakeActionParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
            action: serde_json::json!({ "transferAmount": U256::from(3u64) }),
        })
        .await
        .unwrap();
    assert_eq!(advanced.latest_version_number, 1);
    assert!(advanced.latest_action.is_some());

    b.engine
        .uninstall(UninstallParams {
            multisig_address: MULTISIG,
            identity_hash: proposal.identity_hash,
        })
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    for node in [&a, &b] {
        let balances = node
            .channel()
            .await
            .free_balance()
            .unwrap()
            .to_token_indexed_map();
        // B deposited 7, transferred 3 to A in-app: B nets 15-7+4, A 15+3.
        assert_eq!(balances[&TOKEN][&b.address], U256::from(12u64));
        assert_eq!(balances[&TOKEN][&a.address], U256::from(18u64));
    }
}

#[tokio::test]
async fn test_cannot_uninstall_free_balance() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let free_balance_hash = a
        .channel()
        .await
        .free_balance_app_instance()
        .identity_hash();

    let err = a
        .engine
        .uninstall(UninstallParams {
            multisig_address: MULTISIG,
            identity_hash: free_balance_hash,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.source,
        ProtocolError::Channel(ChannelError::CannotUninstallFreeBalance { .. })
    ));

    // Channel untouched.
    let channel = a.channel().await;
    assert_eq!(channel.free_balance_app_instance().identity_hash(), free_balance_hash);
}
