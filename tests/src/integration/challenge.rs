//! Challenge record semantics through the engine surface: concurrent
//! writers converge to the single highest version, never a lower one.

use shared_types::Bytes32;

use super::fixtures::{challenge, create_channel, two_nodes};

#[tokio::test]
async fn test_concurrent_challenge_saves_keep_highest_version() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let identity_hash = Bytes32([0x31; 32]);
    let mut tasks = Vec::new();
    for version_number in 1..=16u64 {
        let engine = a.engine.clone();
        tasks.push(tokio::spawn(async move {
            engine.save_app_challenge(challenge(identity_hash, version_number)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = a
        .engine
        .get_app_challenge(identity_hash)
        .await
        .unwrap()
        .expect("challenge stored");
    assert_eq!(stored.version_number, 16);
}

#[tokio::test]
async fn test_late_lower_version_never_wins() {
    let (_bus, a, b) = two_nodes();
    create_channel(&a, &b).await;

    let identity_hash = Bytes32([0x32; 32]);
    assert!(a
        .engine
        .save_app_challenge(challenge(identity_hash, 9))
        .await
        .unwrap());
    assert!(!a
        .engine
        .save_app_challenge(challenge(identity_hash, 4))
        .await
        .unwrap());

    let stored = a
        .engine
        .get_app_challenge(identity_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version_number, 9);
}
